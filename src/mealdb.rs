use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::FetchError;
use crate::recipe::Recipe;

pub const DEFAULT_MEALDB_URL: &str = "https://www.themealdb.com/api/json/v1/1";

/// Where recipes come from. `Ok(None)` means the lookup succeeded but matched nothing.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn random(&self) -> Result<Option<Recipe>, FetchError>;
    async fn search(&self, name: &str) -> Result<Option<Recipe>, FetchError>;
}

#[derive(Deserialize)]
struct MealsEnvelope {
    #[serde(default)]
    meals: Option<Vec<Recipe>>,
}

/// First meal of a `{ "meals": [...] }` payload. MealDB answers `null` on no match.
pub fn parse_meals(body: &str) -> Result<Option<Recipe>, serde_json::Error> {
    let envelope: MealsEnvelope = serde_json::from_str(body)?;
    Ok(envelope.meals.and_then(|meals| meals.into_iter().next()))
}

#[derive(Clone)]
pub struct MealDbClient {
    http: Client,
    base_url: String,
}

impl MealDbClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn random_request(&self) -> reqwest::RequestBuilder {
        self.http.get(format!("{}/random.php", self.base_url))
    }

    fn search_request(&self, name: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/search.php", self.base_url))
            .query(&[("s", name)])
    }

    async fn first_meal(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<Recipe>, FetchError> {
        let body = request.send().await?.error_for_status()?.text().await?;
        let recipe = parse_meals(&body)?;
        log::debug!(
            "MealDB returned {:?}",
            recipe.as_ref().and_then(Recipe::name)
        );
        Ok(recipe)
    }
}

#[async_trait]
impl RecipeSource for MealDbClient {
    async fn random(&self) -> Result<Option<Recipe>, FetchError> {
        self.first_meal(self.random_request()).await
    }

    async fn search(&self, name: &str) -> Result<Option<Recipe>, FetchError> {
        self.first_meal(self.search_request(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MealDbClient {
        MealDbClient::new(Client::new(), format!("{DEFAULT_MEALDB_URL}/"))
    }

    #[test]
    fn takes_first_meal() {
        let body = r#"{"meals":[{"strMeal":"Spicy Arrabiata Penne"},{"strMeal":"Other"}]}"#;
        let recipe = parse_meals(body).unwrap().unwrap();
        assert_eq!(recipe.name(), Some("Spicy Arrabiata Penne"));
    }

    #[test]
    fn empty_results_are_none() {
        assert!(parse_meals(r#"{"meals":null}"#).unwrap().is_none());
        assert!(parse_meals(r#"{"meals":[]}"#).unwrap().is_none());
        assert!(parse_meals("{}").unwrap().is_none());
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_meals("<html>busy</html>").is_err());
        assert!(parse_meals(r#"{"meals":"Invalid ID"}"#).is_err());
    }

    #[test]
    fn random_hits_fixed_endpoint() {
        let request = client().random_request().build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://www.themealdb.com/api/json/v1/1/random.php"
        );
    }

    #[test]
    fn search_encodes_the_name() {
        let request = client().search_request("Beef & Mustard Pie").build().unwrap();
        assert_eq!(request.url().path(), "/api/json/v1/1/search.php");
        assert_eq!(request.url().query(), Some("s=Beef+%26+Mustard+Pie"));
        let pairs: Vec<_> = request.url().query_pairs().collect();
        assert_eq!(pairs[0].1, "Beef & Mustard Pie");
    }
}
