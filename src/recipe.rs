use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of indexed ingredient/measure slots a MealDB record carries.
pub const MAX_INGREDIENTS: usize = 20;

/// A meal record as returned by TheMealDB. Kept as raw JSON so the remix
/// prompt can embed it untouched; fields are read optimistically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(Map<String, Value>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingredient<'a> {
    pub name: &'a str,
    pub measure: Option<&'a str>,
}

impl Recipe {
    fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.field("idMeal")
    }

    pub fn name(&self) -> Option<&str> {
        self.field("strMeal")
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.field("strMealThumb")
    }

    pub fn instructions(&self) -> &str {
        self.field("strInstructions").unwrap_or_default()
    }

    /// Non-blank ingredients in slot order, each with its measure if one is set.
    pub fn ingredients(&self) -> Vec<Ingredient<'_>> {
        (1..=MAX_INGREDIENTS)
            .filter_map(|i| {
                let name = self.field(&format!("strIngredient{i}"))?.trim();
                if name.is_empty() {
                    return None;
                }
                let measure = self
                    .field(&format!("strMeasure{i}"))
                    .map(str::trim)
                    .filter(|m| !m.is_empty());
                Some(Ingredient { name, measure })
            })
            .collect()
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

#[cfg(test)]
pub(crate) fn sample(value: Value) -> Recipe {
    match value {
        Value::Object(map) => Recipe(map),
        other => panic!("sample recipe must be an object, got {other}"),
    }
}
