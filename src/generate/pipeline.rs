//! Two-stage generation pipeline: a creative draft pass followed by a
//! deterministic correction pass, plus local validation so the result
//! never names an ingredient the caller does not have.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{Sampling, TextGenerator};
use super::GenerateError;
use crate::normalize;

/// Pantry staples the generator may use beyond the caller's ingredients.
pub const PANTRY_SEASONINGS: &[&str] = &[
    "salt",
    "black pepper",
    "olive oil",
    "vegetable oil",
    "butter",
    "sugar",
    "flour",
    "water",
    "garlic powder",
    "onion powder",
    "paprika",
    "dried oregano",
    "soy sauce",
    "vinegar",
    "lemon juice",
];

const MAX_TOKENS: u32 = 2048;

/// The shape we ask the provider for. Ingredient lines are tolerated as
/// either flat strings or structured objects since the provider's output
/// shape is not contractually guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecipe {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default = "default_servings")]
    pub servings: i32,
    #[serde(default)]
    pub prep_minutes: i32,
    #[serde(default)]
    pub cook_minutes: i32,
    #[serde(default)]
    pub difficulty: String,
    pub ingredients: Vec<IngredientLine>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub nutrition: Option<NutritionFacts>,
}

fn default_servings() -> i32 {
    2
}

/// Provider ingredient lines: a flat string or a structured object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientLine {
    Raw(String),
    Structured {
        #[serde(default)]
        amount: Option<AmountValue>,
        #[serde(default)]
        unit: Option<String>,
        #[serde(alias = "item", alias = "ingredient")]
        name: String,
        #[serde(default)]
        preparation: Option<String>,
    },
}

/// Amounts come back as numbers or strings depending on provider mood.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountValue {
    Number(f64),
    Text(String),
}

impl IngredientLine {
    /// Coerce to the flat "amount unit name" display string.
    pub fn to_display(&self) -> String {
        match self {
            IngredientLine::Raw(s) => s.trim().to_string(),
            IngredientLine::Structured {
                amount,
                unit,
                name,
                preparation,
            } => {
                let mut parts: Vec<String> = Vec::new();
                match amount {
                    Some(AmountValue::Number(n)) => {
                        if n.fract() == 0.0 {
                            parts.push(format!("{}", *n as i64));
                        } else {
                            parts.push(format!("{}", n));
                        }
                    }
                    Some(AmountValue::Text(t)) if !t.trim().is_empty() => {
                        parts.push(t.trim().to_string())
                    }
                    _ => {}
                }
                if let Some(u) = unit {
                    if !u.trim().is_empty() {
                        parts.push(u.trim().to_string());
                    }
                }
                parts.push(name.trim().to_string());
                let mut line = parts.join(" ");
                if let Some(p) = preparation {
                    if !p.trim().is_empty() {
                        line.push_str(", ");
                        line.push_str(p.trim());
                    }
                }
                line
            }
        }
    }

    fn name(&self) -> String {
        match self {
            IngredientLine::Raw(s) => normalize::parse(s).name,
            IngredientLine::Structured { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct NutritionFacts {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
    #[serde(default)]
    pub sugar_g: f64,
    #[serde(default)]
    pub sodium_mg: f64,
}

/// A finished generation result: everything flattened and validated.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRecipe {
    pub title: String,
    pub description: String,
    pub cuisine: String,
    pub servings: i32,
    pub prep_minutes: i32,
    pub cook_minutes: i32,
    pub difficulty: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub nutrition: NutritionFacts,
}

/// Run the two-stage pipeline. Stage-1 transport failure aborts the
/// whole generation; everything downstream degrades instead of failing.
pub async fn generate_recipe(
    generator: &dyn TextGenerator,
    ingredients: &[String],
    cuisine: Option<&str>,
    dietary: Option<&str>,
) -> Result<GeneratedRecipe, GenerateError> {
    let draft_prompt = draft_prompt(ingredients, cuisine, dietary);
    let raw = generator
        .generate_text(
            &draft_prompt,
            Sampling {
                temperature: 0.9,
                max_tokens: MAX_TOKENS,
            },
        )
        .await?;

    let draft = match parse_recipe_json(&raw) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "draft output unparseable, using synthetic recipe");
            synthetic_draft(ingredients)
        }
    };

    let corrected = match correction_pass(generator, &draft, ingredients).await {
        Ok(d) => d,
        Err(e) => {
            debug!(error = %e, "correction pass failed, keeping draft");
            draft
        }
    };

    Ok(finalize(corrected, ingredients))
}

async fn correction_pass(
    generator: &dyn TextGenerator,
    draft: &DraftRecipe,
    ingredients: &[String],
) -> Result<DraftRecipe, GenerateError> {
    let draft_json =
        serde_json::to_string(draft).map_err(|e| GenerateError::Parse(e.to_string()))?;
    let prompt = correction_prompt(&draft_json, ingredients);
    let raw = generator
        .generate_text(
            &prompt,
            Sampling {
                temperature: 0.2,
                max_tokens: MAX_TOKENS,
            },
        )
        .await?;
    parse_recipe_json(&raw)
}

fn draft_prompt(ingredients: &[String], cuisine: Option<&str>, dietary: Option<&str>) -> String {
    let mut prompt = format!(
        "Create a recipe using ONLY these ingredients: {}.\n\
         You may also use these common seasonings and staples: {}.\n\
         Do not use any ingredient outside those two lists.\n",
        ingredients.join(", "),
        PANTRY_SEASONINGS.join(", "),
    );
    if let Some(c) = cuisine {
        if !c.trim().is_empty() {
            prompt.push_str(&format!("Cuisine preference: {}.\n", c.trim()));
        }
    }
    if let Some(d) = dietary {
        if !d.trim().is_empty() {
            prompt.push_str(&format!("Dietary restriction: {}.\n", d.trim()));
        }
    }
    prompt.push_str(
        "Respond with a single JSON object and nothing else, with keys: \
         title, description, cuisine, servings, prep_minutes, cook_minutes, \
         difficulty (easy|medium|hard), ingredients (array of strings like \
         \"2 cups rice\"), instructions (array of strings, in order), \
         nutrition (object with calories, protein_g, carbs_g, fat_g, \
         fiber_g, sugar_g, sodium_mg).",
    );
    prompt
}

fn correction_prompt(draft_json: &str, ingredients: &[String]) -> String {
    format!(
        "Review this recipe JSON. Remove any ingredient that is not in \
         the allowed list ({} — plus common seasonings: {}). Fix quantities \
         that are unrealistic. Make sure every key is present: title, \
         description, cuisine, servings, prep_minutes, cook_minutes, \
         difficulty, ingredients, instructions, nutrition. Respond with the \
         corrected JSON object and nothing else.\n\n{}",
        ingredients.join(", "),
        PANTRY_SEASONINGS.join(", "),
        draft_json,
    )
}

/// Parse provider output as a recipe, tolerating code-fence wrapping.
fn parse_recipe_json(raw: &str) -> Result<DraftRecipe, GenerateError> {
    let stripped = strip_code_fences(raw);
    serde_json::from_str(stripped).map_err(|e| GenerateError::Parse(e.to_string()))
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag after the opening fence.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.trim().trim_end_matches("```").trim()
}

/// Minimal recipe built straight from the inputs, used when the draft
/// stage returns something unparseable.
fn synthetic_draft(ingredients: &[String]) -> DraftRecipe {
    let primary = ingredients.first().map(String::as_str).unwrap_or("pantry");
    DraftRecipe {
        title: format!("Simple {} Skillet", title_case(primary)),
        description: format!("A quick dish made with {}.", ingredients.join(", ")),
        cuisine: "home style".to_string(),
        servings: 2,
        prep_minutes: 10,
        cook_minutes: 20,
        difficulty: "easy".to_string(),
        ingredients: ingredients
            .iter()
            .map(|i| IngredientLine::Raw(format!("1 cup {}", i)))
            .collect(),
        instructions: vec![
            "Prepare and chop all ingredients.".to_string(),
            "Heat a little oil in a skillet over medium heat.".to_string(),
            format!("Add {} and cook until done, seasoning to taste.", ingredients.join(", ")),
        ],
        nutrition: None,
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Flatten lines, drop anything outside the allowed ingredient set, and
/// fill defaults. The correction stage is asked to do this too, but its
/// output is untrusted.
fn finalize(draft: DraftRecipe, ingredients: &[String]) -> GeneratedRecipe {
    let allowed: Vec<String> = ingredients
        .iter()
        .map(|i| normalize::core_key(i))
        .chain(PANTRY_SEASONINGS.iter().map(|s| normalize::core_key(s)))
        .collect();

    let mut lines: Vec<String> = draft
        .ingredients
        .iter()
        .filter(|line| allowed.contains(&normalize::core_key(&line.name())))
        .map(IngredientLine::to_display)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        lines = ingredients.iter().map(|i| format!("1 cup {}", i)).collect();
    }

    let difficulty = match draft.difficulty.to_lowercase().as_str() {
        "medium" => "medium",
        "hard" => "hard",
        _ => "easy",
    };

    let instructions = if draft.instructions.is_empty() {
        vec![format!("Combine {} and cook until done.", lines.join(", "))]
    } else {
        draft.instructions
    };

    GeneratedRecipe {
        title: draft.title,
        description: draft.description,
        cuisine: draft.cuisine,
        servings: draft.servings.max(1),
        prep_minutes: draft.prep_minutes.max(0),
        cook_minutes: draft.cook_minutes.max(0),
        difficulty: difficulty.to_string(),
        ingredients: lines,
        instructions,
        nutrition: draft.nutrition.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted generator: pops one canned response per call.
    struct FakeGenerator {
        responses: Mutex<Vec<Result<String, String>>>,
    }

    impl FakeGenerator {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate_text(
            &self,
            _prompt: &str,
            _sampling: Sampling,
        ) -> Result<String, GenerateError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .expect("unscripted call")
                .map_err(GenerateError::Request)
        }
    }

    fn draft_json(title: &str, ingredients: &str) -> String {
        format!(
            r#"{{"title":"{}","servings":2,"prep_minutes":5,"cook_minutes":15,
                "difficulty":"easy","ingredients":{},"instructions":["Cook it."],
                "nutrition":{{"calories":300}}}}"#,
            title, ingredients
        )
    }

    #[tokio::test]
    async fn happy_path_uses_corrected_output() {
        let gen = FakeGenerator::new(vec![
            Ok(&draft_json("Draft Rice", r#"["2 cups rice"]"#)),
            Ok(&draft_json("Corrected Rice", r#"["2 cups rice"]"#)),
        ]);
        let recipe = generate_recipe(&gen, &["rice".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(recipe.title, "Corrected Rice");
        assert_eq!(recipe.ingredients, vec!["2 cups rice"]);
        assert_eq!(recipe.nutrition.calories, 300.0);
        assert_eq!(recipe.nutrition.protein_g, 0.0);
    }

    #[tokio::test]
    async fn code_fences_are_stripped() {
        let fenced = format!("```json\n{}\n```", draft_json("Fenced", r#"["1 cup rice"]"#));
        let gen = FakeGenerator::new(vec![Ok(fenced.as_str()), Err("boom")]);
        let recipe = generate_recipe(&gen, &["rice".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(recipe.title, "Fenced");
    }

    #[tokio::test]
    async fn stage_two_failure_keeps_draft() {
        let gen = FakeGenerator::new(vec![
            Ok(&draft_json("Draft Only", r#"["1 cup rice"]"#)),
            Err("timed out"),
        ]);
        let recipe = generate_recipe(&gen, &["rice".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(recipe.title, "Draft Only");
    }

    #[tokio::test]
    async fn stage_one_parse_failure_yields_synthetic() {
        let gen = FakeGenerator::new(vec![Ok("I refuse to answer in JSON"), Err("down")]);
        let recipe = generate_recipe(&gen, &["unobtainium".to_string()], None, None)
            .await
            .unwrap();
        assert!(!recipe.title.is_empty());
        assert_eq!(recipe.ingredients, vec!["1 cup unobtainium"]);
        assert!(!recipe.instructions.is_empty());
        assert_eq!(recipe.nutrition, NutritionFacts::default());
    }

    #[tokio::test]
    async fn stage_one_transport_failure_aborts() {
        let gen = FakeGenerator::new(vec![Err("timed out")]);
        let result = generate_recipe(&gen, &["rice".to_string()], None, None).await;
        assert!(matches!(result, Err(GenerateError::Request(_))));
    }

    #[tokio::test]
    async fn disallowed_ingredients_are_dropped() {
        let gen = FakeGenerator::new(vec![
            Ok(&draft_json(
                "Sneaky",
                r#"["1 cup rice","3 oz saffron threads","1 tsp salt"]"#,
            )),
            Err("skip correction"),
        ]);
        let recipe = generate_recipe(&gen, &["rice".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(recipe.ingredients, vec!["1 cup rice", "1 tsp salt"]);
    }

    #[tokio::test]
    async fn structured_lines_are_coerced() {
        let gen = FakeGenerator::new(vec![
            Ok(&draft_json(
                "Structured",
                r#"[{"amount":2,"unit":"cups","name":"rice"},
                    {"amount":"1/2","unit":"tsp","item":"salt","preparation":"to taste"}]"#,
            )),
            Err("skip correction"),
        ]);
        let recipe = generate_recipe(&gen, &["rice".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(
            recipe.ingredients,
            vec!["2 cups rice", "1/2 tsp salt, to taste"]
        );
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn difficulty_is_sanitized() {
        let mut draft = synthetic_draft(&["rice".to_string()]);
        draft.difficulty = "EXTREME".to_string();
        let recipe = finalize(draft, &["rice".to_string()]);
        assert_eq!(recipe.difficulty, "easy");
    }
}
