use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    filters::ListQuery,
    model::User,
    pagination::Page,
    validation::{MAX_LENGTH, MIN_PASSWORD_LENGTH},
};

// Fields are optional so that missing input surfaces as a field error
// rather than a body rejection.

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub users: Page<User>,
    pub filters: ListQuery,
}

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub user: User,
}

/// One input of the create/edit forms.
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FormField {
    fn text(name: &'static str, label: &'static str, kind: &'static str) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
            min_length: None,
            max_length: Some(MAX_LENGTH),
        }
    }

    fn password(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: "password",
            required: true,
            min_length: Some(MIN_PASSWORD_LENGTH),
            max_length: None,
        }
    }
}

pub fn profile_fields() -> Vec<FormField> {
    vec![
        FormField::text("name", "Name", "text"),
        FormField::text("email", "Email", "email"),
    ]
}

pub fn create_fields() -> Vec<FormField> {
    let mut fields = profile_fields();
    fields.push(FormField::password("password", "Password"));
    fields.push(FormField::password(
        "password_confirmation",
        "Confirm Password",
    ));
    fields
}

#[derive(Debug, Serialize)]
pub struct CreateFormResponse {
    pub action: &'static str,
    pub method: &'static str,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Serialize)]
pub struct EditFormResponse {
    pub action: String,
    pub method: &'static str,
    pub user: User,
    pub fields: Vec<FormField>,
}

/// 303 back to a listing, carrying a one-shot success message.
#[derive(Debug)]
pub struct FlashRedirect {
    pub to: &'static str,
    pub success: &'static str,
}

impl FlashRedirect {
    pub fn to_index(success: &'static str) -> Self {
        Self {
            to: super::services::INDEX_PATH,
            success,
        }
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, self.to)],
            Json(json!({ "success": self.success, "redirect": self.to })),
        )
            .into_response()
    }
}
