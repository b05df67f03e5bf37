use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::devices::ClaimedDeviceId;
use crate::generate::NutritionFacts;
use crate::normalize;

#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cuisine: String,
    pub servings: i32,
    pub prep_minutes: i32,
    pub cook_minutes: i32,
    pub difficulty: String,
    pub source: String,
    pub average_rating: f64,
    pub rating_count: i32,
    pub submitted_by: Option<String>,
    pub created_at: OffsetDateTime,
}

// Qualified so the column list stays unambiguous in joined queries.
const RECIPE_COLUMNS: &str = "r.id, r.title, r.description, r.cuisine, r.servings, \
     r.prep_minutes, r.cook_minutes, r.difficulty, r.source, r.average_rating, \
     r.rating_count, r.submitted_by, r.created_at";

/// Recipe ids this device must never be offered again: everything it
/// has viewed plus everything it submitted. Recomputed per request; the
/// set changes after every successful match, so caching would go stale
/// within a session.
pub async fn exclusion_set(db: &PgPool, device: &ClaimedDeviceId) -> anyhow::Result<Vec<Uuid>> {
    if device.is_anonymous() {
        return Ok(Vec::new());
    }
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT recipe_id FROM recipe_views WHERE device_id = $1
        UNION
        SELECT id FROM recipes WHERE submitted_by = $1
        "#,
    )
    .bind(device.as_str())
    .fetch_all(db)
    .await?;
    Ok(ids)
}

/// A non-excluded recipe with its ingredient counts relative to one
/// query: how many distinct ingredients it has, and how many of those
/// are in the query's core-key set.
#[derive(Debug, Clone, FromRow)]
pub struct MatchCandidate {
    #[sqlx(flatten)]
    pub recipe: RecipeRow,
    pub total_ingredients: i64,
    pub matched_ingredients: i64,
}

/// Exact-set matching: a recipe qualifies only when its full distinct
/// ingredient set equals the query's core-key set in both directions.
/// Among qualifiers the highest average rating wins, ties broken by
/// rating count. The store supplies the counts; qualification and
/// selection happen in [`select_best_match`].
pub async fn find_exact_match(
    db: &PgPool,
    core_keys: &[String],
    exclusions: &[Uuid],
) -> anyhow::Result<Option<RecipeRow>> {
    let candidates = fetch_candidates(db, core_keys, exclusions).await?;
    Ok(select_best_match(candidates, core_keys.len()))
}

/// Count ingredients per non-excluded recipe that overlaps the query
/// at all. Candidates with no overlap can never qualify, so they are
/// filtered out here rather than shipped back.
pub async fn fetch_candidates(
    db: &PgPool,
    core_keys: &[String],
    exclusions: &[Uuid],
) -> anyhow::Result<Vec<MatchCandidate>> {
    let query = format!(
        r#"
        SELECT {RECIPE_COLUMNS},
               COUNT(DISTINCT ri.ingredient_id) AS total_ingredients,
               COUNT(DISTINCT ri.ingredient_id)
                   FILTER (WHERE i.name = ANY($1)) AS matched_ingredients
        FROM recipes r
        JOIN recipe_ingredients ri ON ri.recipe_id = r.id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE NOT (r.id = ANY($2))
        GROUP BY r.id
        HAVING COUNT(DISTINCT ri.ingredient_id)
                   FILTER (WHERE i.name = ANY($1)) > 0
        "#
    );
    let rows = sqlx::query_as::<_, MatchCandidate>(&query)
        .bind(core_keys)
        .bind(exclusions)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// The exact-set qualification rule: `total == matched == |query|`,
/// i.e. the recipe's ingredient set and the query set are identical.
/// Strict subsets and supersets in either direction never qualify.
pub fn select_best_match(
    candidates: Vec<MatchCandidate>,
    query_size: usize,
) -> Option<RecipeRow> {
    let required = query_size as i64;
    candidates
        .into_iter()
        .filter(|c| c.total_ingredients == required && c.matched_ingredients == required)
        .max_by(|a, b| {
            a.recipe
                .average_rating
                .total_cmp(&b.recipe.average_rating)
                .then(a.recipe.rating_count.cmp(&b.recipe.rating_count))
        })
        .map(|c| c.recipe)
}

#[derive(Debug, Clone, Default)]
pub struct RecipeDetails {
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub nutrition: NutritionFacts,
}

pub async fn load_details(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<RecipeDetails> {
    let ingredients = sqlx::query_scalar::<_, String>(
        "SELECT original_text FROM recipe_ingredients WHERE recipe_id = $1 ORDER BY position",
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;

    let instructions = sqlx::query_scalar::<_, String>(
        "SELECT text FROM instruction_steps WHERE recipe_id = $1 ORDER BY step_number",
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;

    let nutrition = sqlx::query_as::<_, NutritionFacts>(
        r#"
        SELECT calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg
        FROM nutrition WHERE recipe_id = $1
        "#,
    )
    .bind(recipe_id)
    .fetch_optional(db)
    .await?
    .unwrap_or_default();

    Ok(RecipeDetails {
        ingredients,
        instructions,
        nutrition,
    })
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub cuisine: String,
    pub servings: i32,
    pub prep_minutes: i32,
    pub cook_minutes: i32,
    pub difficulty: String,
    pub source: &'static str,
    pub submitted_by: Option<String>,
    pub ingredient_lines: Vec<String>,
    pub instructions: Vec<String>,
    pub nutrition: NutritionFacts,
}

/// Save a recipe with all its owned rows in one transaction. Title is
/// the dedup key: if another writer got there first, their recipe id is
/// returned and nothing is written (`created == false`). Partial writes
/// are never observable; any failure rolls back the whole save.
pub async fn save_recipe(db: &PgPool, new: &NewRecipe) -> anyhow::Result<(Uuid, bool)> {
    let mut tx = db.begin().await?;

    let inserted = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO recipes
            (title, description, cuisine, servings, prep_minutes, cook_minutes,
             difficulty, source, submitted_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (title) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.cuisine)
    .bind(new.servings)
    .bind(new.prep_minutes)
    .bind(new.cook_minutes)
    .bind(&new.difficulty)
    .bind(new.source)
    .bind(&new.submitted_by)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(recipe_id) = inserted else {
        tx.rollback().await?;
        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM recipes WHERE title = $1")
            .bind(&new.title)
            .fetch_one(db)
            .await?;
        return Ok((existing, false));
    };

    for (position, line) in new.ingredient_lines.iter().enumerate() {
        let parsed = normalize::parse(line);
        let key = normalize::core_key(&parsed.name);
        if key.is_empty() {
            continue;
        }

        // Atomic insert-or-get so two concurrent saves of a new
        // ingredient converge on one row.
        let ingredient_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ingredients (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(&key)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients
                (recipe_id, ingredient_id, amount, unit, original_text, preparation, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (recipe_id, ingredient_id) DO NOTHING
            "#,
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(parsed.amount)
        .bind(&parsed.unit)
        .bind(line.trim())
        .bind(&parsed.preparation)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    for (i, step) in new.instructions.iter().enumerate() {
        sqlx::query(
            "INSERT INTO instruction_steps (recipe_id, step_number, text) VALUES ($1, $2, $3)",
        )
        .bind(recipe_id)
        .bind((i + 1) as i32)
        .bind(step)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO nutrition
            (recipe_id, calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(recipe_id)
    .bind(new.nutrition.calories)
    .bind(new.nutrition.protein_g)
    .bind(new.nutrition.carbs_g)
    .bind(new.nutrition.fat_g)
    .bind(new.nutrition.fiber_g)
    .bind(new.nutrition.sugar_g)
    .bind(new.nutrition.sodium_mg)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((recipe_id, true))
}

pub async fn popular(db: &PgPool, limit: i64) -> anyhow::Result<Vec<RecipeRow>> {
    let query = format!(
        r#"
        SELECT {RECIPE_COLUMNS}
        FROM recipes r
        ORDER BY r.average_rating DESC, r.rating_count DESC, r.created_at DESC
        LIMIT $1
        "#
    );
    let rows = sqlx::query_as::<_, RecipeRow>(&query)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Clamp free-text difficulty to the stored enum, defaulting to easy.
pub fn clamp_difficulty(raw: Option<&str>) -> &'static str {
    match raw.map(|d| d.trim().to_lowercase()).as_deref() {
        Some("medium") => "medium",
        Some("hard") => "hard",
        _ => "easy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_clamps_to_enum() {
        assert_eq!(clamp_difficulty(Some("Medium")), "medium");
        assert_eq!(clamp_difficulty(Some("HARD ")), "hard");
        assert_eq!(clamp_difficulty(Some("impossible")), "easy");
        assert_eq!(clamp_difficulty(None), "easy");
    }

    fn candidate(title: &str, total: i64, matched: i64, avg: f64, count: i32) -> MatchCandidate {
        MatchCandidate {
            recipe: RecipeRow {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: String::new(),
                cuisine: String::new(),
                servings: 2,
                prep_minutes: 0,
                cook_minutes: 0,
                difficulty: "easy".to_string(),
                source: "database".to_string(),
                average_rating: avg,
                rating_count: count,
                submitted_by: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            total_ingredients: total,
            matched_ingredients: matched,
        }
    }

    #[test]
    fn only_identical_ingredient_sets_qualify() {
        // Query of 2: a recipe using a strict subset of the query
        // (total 1) or a strict superset (total 3, matched 2) must
        // never match; only total == matched == 2 does.
        let candidates = vec![
            candidate("subset", 1, 1, 5.0, 10),
            candidate("superset", 3, 2, 5.0, 10),
            candidate("exact", 2, 2, 1.0, 0),
        ];
        let best = select_best_match(candidates, 2).unwrap();
        assert_eq!(best.title, "exact");
    }

    #[test]
    fn no_qualifier_means_no_match() {
        let candidates = vec![
            candidate("partial", 4, 2, 5.0, 10),
            candidate("disjoint-size", 3, 3, 5.0, 10),
        ];
        assert!(select_best_match(candidates, 2).is_none());
    }

    #[test]
    fn highest_rating_wins() {
        let candidates = vec![
            candidate("ok", 2, 2, 3.5, 100),
            candidate("best", 2, 2, 4.8, 2),
            candidate("good", 2, 2, 4.2, 50),
        ];
        assert_eq!(select_best_match(candidates, 2).unwrap().title, "best");
    }

    #[test]
    fn rating_count_breaks_ties() {
        let candidates = vec![
            candidate("newer", 2, 2, 4.5, 3),
            candidate("established", 2, 2, 4.5, 40),
        ];
        assert_eq!(
            select_best_match(candidates, 2).unwrap().title,
            "established"
        );
    }

    #[test]
    fn empty_candidate_list() {
        assert!(select_best_match(Vec::new(), 1).is_none());
    }
}

// End-to-end store behavior: saved recipes must be findable by the
// exact-set query and excluded once viewed. Needs a running Postgres
// with DATABASE_URL set; run with `cargo test -- --ignored`.
#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::generate::NutritionFacts;
    use crate::ratings;
    use crate::recipes::services::distinct_core_keys;

    fn test_soup() -> NewRecipe {
        NewRecipe {
            title: "Test Soup".to_string(),
            description: String::new(),
            cuisine: String::new(),
            servings: 2,
            prep_minutes: 5,
            cook_minutes: 20,
            difficulty: "easy".to_string(),
            source: "user_generated",
            submitted_by: None,
            ingredient_lines: vec!["2 cups broth".to_string(), "1 cup carrots".to_string()],
            instructions: vec!["Simmer everything.".to_string()],
            nutrition: NutritionFacts::default(),
        }
    }

    #[sqlx::test]
    #[ignore]
    async fn saved_recipe_matches_exact_query(pool: PgPool) {
        let (id, created) = save_recipe(&pool, &test_soup()).await.unwrap();
        assert!(created);

        let keys = distinct_core_keys(&["broth".to_string(), "carrots".to_string()]);
        let hit = find_exact_match(&pool, &keys, &[]).await.unwrap().unwrap();
        assert_eq!(hit.id, id);
        assert_eq!(hit.title, "Test Soup");

        // Subset and superset queries must not match.
        let subset = distinct_core_keys(&["broth".to_string()]);
        assert!(find_exact_match(&pool, &subset, &[]).await.unwrap().is_none());
        let superset = distinct_core_keys(&[
            "broth".to_string(),
            "carrots".to_string(),
            "onion".to_string(),
        ]);
        assert!(find_exact_match(&pool, &superset, &[])
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test]
    #[ignore]
    async fn viewed_recipe_is_excluded_on_next_request(pool: PgPool) {
        let (id, _) = save_recipe(&pool, &test_soup()).await.unwrap();
        let device = ClaimedDeviceId::new("d1");
        let keys = distinct_core_keys(&["broth".to_string(), "carrots".to_string()]);

        let exclusions = exclusion_set(&pool, &device).await.unwrap();
        let first = find_exact_match(&pool, &keys, &exclusions).await.unwrap();
        assert_eq!(first.unwrap().id, id);
        ratings::repo::record_view(&pool, id, &device).await.unwrap();

        let exclusions = exclusion_set(&pool, &device).await.unwrap();
        assert!(exclusions.contains(&id));
        let second = find_exact_match(&pool, &keys, &exclusions).await.unwrap();
        assert!(second.is_none());

        // A device with no history still sees it.
        let other = exclusion_set(&pool, &ClaimedDeviceId::new("d2")).await.unwrap();
        assert!(find_exact_match(&pool, &keys, &other).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[ignore]
    async fn duplicate_title_returns_existing_id(pool: PgPool) {
        let (first, created) = save_recipe(&pool, &test_soup()).await.unwrap();
        assert!(created);
        let (second, created) = save_recipe(&pool, &test_soup()).await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }
}
