/// User Routes
///
/// Preferences and password change for the authenticated user.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::CredentialHasher;
use crate::error::{AppError, AuthError, ErrorContext, Rejection};
use crate::users::{Identity, UserStore};
use crate::validators::is_valid_password;

/// Preferences as presented to clients, with defaults for absent keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default = "default_skill_level")]
    pub skill_level: String,
    #[serde(default = "default_max_cook_time")]
    pub max_cook_time: i64,
    #[serde(default = "default_servings")]
    pub servings: i64,
}

fn default_skill_level() -> String {
    "intermediate".to_string()
}

fn default_max_cook_time() -> i64 {
    60
}

fn default_servings() -> i64 {
    2
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dietary: Vec::new(),
            allergies: Vec::new(),
            cuisines: Vec::new(),
            skill_level: default_skill_level(),
            max_cook_time: default_max_cook_time(),
            servings: default_servings(),
        }
    }
}

impl Preferences {
    /// Read the stored document. Keys of the wrong type fall back to defaults.
    pub fn from_document(document: &Value) -> Self {
        let Some(stored) = document.as_object() else {
            return Self::default();
        };

        let defaults = Self::default();
        let strings = |key: &str, fallback: Vec<String>| {
            stored
                .get(key)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or(fallback)
        };

        Self {
            dietary: strings("dietary", defaults.dietary),
            allergies: strings("allergies", defaults.allergies),
            cuisines: strings("cuisines", defaults.cuisines),
            skill_level: stored
                .get("skill_level")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(defaults.skill_level),
            max_cook_time: stored
                .get("max_cook_time")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.max_cook_time),
            servings: stored
                .get("servings")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.servings),
        }
    }
}

/// Partial update; absent and null fields leave the stored value alone
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisines: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cook_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<i64>,
}

impl PreferencesUpdate {
    /// Overlay the set fields onto `current`, keeping any other stored keys.
    pub fn merge_into(&self, current: &Value) -> Result<Value, AppError> {
        let mut merged = current.as_object().cloned().unwrap_or_else(Map::new);

        let update = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Preferences serialization failed: {}", e)))?;
        if let Value::Object(fields) = update {
            merged.extend(fields);
        }

        Ok(Value::Object(merged))
    }
}

#[derive(Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/v1/user/preferences
pub async fn get_preferences(identity: web::ReqData<Identity>) -> HttpResponse {
    HttpResponse::Ok().json(Preferences::from_document(&identity.preferences))
}

/// PUT /api/v1/user/preferences
pub async fn update_preferences(
    identity: web::ReqData<Identity>,
    form: web::Json<PreferencesUpdate>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let merged = form.merge_into(&identity.preferences)?;
    let updated = users.update_preferences(&identity.id, merged).await?;

    tracing::debug!(user_id = %identity.id, "Preferences updated");
    Ok(HttpResponse::Ok().json(Preferences::from_document(&updated.preferences)))
}

/// POST /api/v1/user/password
///
/// # Errors
/// - 400: new password fails validation
/// - 401: current password does not match
pub async fn change_password(
    identity: web::ReqData<Identity>,
    form: web::Json<PasswordChangeRequest>,
    users: web::Data<dyn UserStore>,
    hasher: web::Data<CredentialHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("password_change").with_user_id(identity.id.as_str());

    is_valid_password(&form.new_password)?;

    let stored_hash = users
        .password_hash(&identity.id)
        .await?
        .ok_or_else(|| AppError::unauthenticated(Rejection::UnknownSubject(identity.id.clone())))?;

    let hasher = *hasher.get_ref();
    let PasswordChangeRequest {
        current_password,
        new_password,
    } = form.into_inner();

    let matches = web::block(move || hasher.verify(&current_password, &stored_hash)).await?;
    if !matches {
        return Err(AuthError::InvalidCredentials.into());
    }

    let new_hash = web::block(move || hasher.hash(&new_password)).await??;
    users.update_password_hash(&identity.id, &new_hash).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "Password changed"
    );

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_for_empty_document() {
        assert_eq!(Preferences::from_document(&json!({})), Preferences::default());
        assert_eq!(Preferences::from_document(&Value::Null), Preferences::default());

        let rendered = serde_json::to_value(Preferences::default()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "dietary": [],
                "allergies": [],
                "cuisines": [],
                "skill_level": "intermediate",
                "max_cook_time": 60,
                "servings": 2
            })
        );
    }

    #[test]
    fn test_stored_values_win() {
        let prefs = Preferences::from_document(&json!({
            "dietary": ["Vegetarian"],
            "max_cook_time": 45,
            "servings": "four"
        }));

        assert_eq!(prefs.dietary, vec!["Vegetarian".to_string()]);
        assert_eq!(prefs.max_cook_time, 45);
        assert_eq!(prefs.servings, 2);
    }

    #[test]
    fn test_merge_keeps_unset_and_unknown_keys() {
        let current = json!({"dietary": ["Vegan"], "servings": 4, "theme": "dark"});
        let update: PreferencesUpdate =
            serde_json::from_value(json!({"servings": 6, "allergies": null})).unwrap();

        let merged = update.merge_into(&current).unwrap();

        assert_eq!(merged, json!({"dietary": ["Vegan"], "servings": 6, "theme": "dark"}));
    }
}
