use sqlx::PgPool;
use uuid::Uuid;

use crate::devices::ClaimedDeviceId;

/// Record that a device has seen a recipe. Idempotent: a device
/// consumes a given recipe at most once, re-recording is a no-op.
pub async fn record_view(
    db: &PgPool,
    recipe_id: Uuid,
    device: &ClaimedDeviceId,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recipe_views (recipe_id, device_id)
        VALUES ($1, $2)
        ON CONFLICT (recipe_id, device_id) DO NOTHING
        "#,
    )
    .bind(recipe_id)
    .bind(device.as_str())
    .execute(db)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    pub average_rating: f64,
    pub rating_count: i32,
}

/// The invariant in one place: a recipe's `(average_rating,
/// rating_count)` is always the arithmetic mean and count of the
/// rating-bearing ledger rows, derived and never independently written.
pub fn aggregate_ratings(ratings: &[i32]) -> RatingAggregate {
    if ratings.is_empty() {
        return RatingAggregate {
            average_rating: 0.0,
            rating_count: 0,
        };
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    RatingAggregate {
        average_rating: sum as f64 / ratings.len() as f64,
        rating_count: ratings.len() as i32,
    }
}

/// Upsert a device's rating for a recipe and recompute the recipe's
/// aggregate in the same transaction, so `(average_rating,
/// rating_count)` always equals the aggregate over the ledger. Returns
/// `None` when the recipe does not exist.
///
/// Side rules, both deliberate product decisions:
/// - the first rating claims a null `submitted_by` for the rater;
/// - a 5-star rating promotes a user-submitted recipe to community
///   status.
pub async fn record_rating(
    db: &PgPool,
    recipe_id: Uuid,
    device: &ClaimedDeviceId,
    rating: i32,
) -> anyhow::Result<Option<RatingAggregate>> {
    let mut tx = db.begin().await?;

    let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM recipes WHERE id = $1 FOR UPDATE")
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query(
        r#"
        INSERT INTO recipe_views (recipe_id, device_id, rating)
        VALUES ($1, $2, $3)
        ON CONFLICT (recipe_id, device_id) DO UPDATE SET rating = EXCLUDED.rating
        "#,
    )
    .bind(recipe_id)
    .bind(device.as_str())
    .bind(rating)
    .execute(&mut *tx)
    .await?;

    let ratings: Vec<i32> = sqlx::query_scalar(
        "SELECT rating FROM recipe_views WHERE recipe_id = $1 AND rating IS NOT NULL",
    )
    .bind(recipe_id)
    .fetch_all(&mut *tx)
    .await?;
    let aggregate = aggregate_ratings(&ratings);

    sqlx::query("UPDATE recipes SET average_rating = $2, rating_count = $3 WHERE id = $1")
        .bind(recipe_id)
        .bind(aggregate.average_rating)
        .bind(aggregate.rating_count)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE recipes SET submitted_by = $2
        WHERE id = $1 AND submitted_by IS NULL AND rating_count = 1
        "#,
    )
    .bind(recipe_id)
    .bind(device.as_str())
    .execute(&mut *tx)
    .await?;

    if rating == 5 {
        sqlx::query(
            r#"
            UPDATE recipes SET is_community = TRUE
            WHERE id = $1 AND source = 'user_generated' AND NOT is_community
            "#,
        )
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(aggregate))
}

/// Round an average to two decimals for the response body; the stored
/// value keeps full precision.
pub fn round_average(avg: f64) -> f64 {
    (avg * 100.0).round() / 100.0
}
