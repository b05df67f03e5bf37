use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use super::ClaimedDeviceId;

#[derive(Debug, Clone, FromRow)]
pub struct PremiumRow {
    pub device_id: String,
    pub is_premium: bool,
    pub purchase_date: Option<OffsetDateTime>,
}

pub async fn get_premium(
    db: &PgPool,
    device: &ClaimedDeviceId,
) -> anyhow::Result<Option<PremiumRow>> {
    let row = sqlx::query_as::<_, PremiumRow>(
        r#"
        SELECT device_id, is_premium, purchase_date
        FROM premium_status
        WHERE device_id = $1
        "#,
    )
    .bind(device.as_str())
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Upsert the entitlement row for a device. Fired on purchase
/// confirmation and on ownership transfer.
pub async fn upsert_premium(
    db: &PgPool,
    device: &ClaimedDeviceId,
    is_premium: bool,
    purchase_date: Option<OffsetDateTime>,
    purchase_token: Option<&str>,
) -> anyhow::Result<PremiumRow> {
    let row = sqlx::query_as::<_, PremiumRow>(
        r#"
        INSERT INTO premium_status (device_id, is_premium, purchase_date, purchase_token, updated_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (device_id) DO UPDATE
        SET is_premium = EXCLUDED.is_premium,
            purchase_date = COALESCE(EXCLUDED.purchase_date, premium_status.purchase_date),
            purchase_token = COALESCE(EXCLUDED.purchase_token, premium_status.purchase_token),
            updated_at = now()
        RETURNING device_id, is_premium, purchase_date
        "#,
    )
    .bind(device.as_str())
    .bind(is_premium)
    .bind(purchase_date)
    .bind(purchase_token)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub struct MigrationCounts {
    pub views: u64,
    pub recipes: u64,
    pub premium: bool,
}

/// Re-key everything a device owns onto a new identity, in one
/// transaction. Rows the new identity already has take precedence; the
/// old duplicates are dropped rather than merged.
pub async fn migrate_device(
    db: &PgPool,
    old: &ClaimedDeviceId,
    new: &ClaimedDeviceId,
) -> anyhow::Result<MigrationCounts> {
    let mut tx = db.begin().await?;

    let views = sqlx::query(
        r#"
        UPDATE recipe_views v
        SET device_id = $2
        WHERE v.device_id = $1
          AND NOT EXISTS (
              SELECT 1 FROM recipe_views w
              WHERE w.recipe_id = v.recipe_id AND w.device_id = $2
          )
        "#,
    )
    .bind(old.as_str())
    .bind(new.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM recipe_views WHERE device_id = $1")
        .bind(old.as_str())
        .execute(&mut *tx)
        .await?;

    let recipes = sqlx::query("UPDATE recipes SET submitted_by = $2 WHERE submitted_by = $1")
        .bind(old.as_str())
        .bind(new.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let premium = sqlx::query(
        r#"
        INSERT INTO premium_status (device_id, is_premium, purchase_date, purchase_token, updated_at)
        SELECT $2, is_premium, purchase_date, purchase_token, now()
        FROM premium_status WHERE device_id = $1
        ON CONFLICT (device_id) DO UPDATE
        SET is_premium = premium_status.is_premium OR EXCLUDED.is_premium,
            purchase_date = COALESCE(premium_status.purchase_date, EXCLUDED.purchase_date),
            purchase_token = COALESCE(premium_status.purchase_token, EXCLUDED.purchase_token),
            updated_at = now()
        "#,
    )
    .bind(old.as_str())
    .bind(new.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM premium_status WHERE device_id = $1")
        .bind(old.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(MigrationCounts {
        views,
        recipes,
        premium: premium > 0,
    })
}
