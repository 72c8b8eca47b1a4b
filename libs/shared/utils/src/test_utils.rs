use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, ReminderConfig};
use shared_models::auth::Role;

use crate::cache::TtlCache;
use crate::extractor::{AuthState, RoleLookup};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: None,
            redis_url: None,
            server_port: 0,
            meeting_base_url: "https://meet.test".to_string(),
            role_cache_ttl_seconds: 60,
            reminder: ReminderConfig::default(),
        }
    }

    /// Auth state that trusts the role claim and never hits the network.
    pub fn auth_state(&self) -> Arc<AuthState> {
        Arc::new(AuthState::new(
            self.jwt_secret.clone(),
            Arc::new(TtlCache::new(StdDuration::from_secs(60))),
            Arc::new(NoRoleLookup),
        ))
    }
}

pub struct NoRoleLookup;

#[async_trait]
impl RoleLookup for NoRoleLookup {
    async fn role_for(&self, _user_id: &str) -> Option<Role> {
        None
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(id: Uuid, email: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    /// Role as the auth middleware will resolve it from the token claim.
    pub fn app_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, email: Option<&str>) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": "Test",
            "last_name": "Patient",
            "email": email,
            "phone": null
        })
    }

    pub fn doctor_response(doctor_id: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": "Jane",
            "last_name": "Smith",
            "is_available": true,
            "buffer_minutes": 0,
            "consultation_duration_minutes": 30,
            "max_daily_appointments": null,
            "working_hours": {
                "monday": [{ "start": "09:00:00", "end": "12:00:00" }],
                "tuesday": [{ "start": "09:00:00", "end": "17:00:00" }]
            }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;

    #[test]
    fn app_config_points_at_the_given_supabase() {
        let app_config = TestConfig::with_supabase_url("http://127.0.0.1:9999").to_app_config();

        assert_eq!(app_config.supabase_url, "http://127.0.0.1:9999");
        assert!(app_config.redis_url.is_none());
        assert_eq!(app_config.reminder, ReminderConfig::default());
    }

    #[test]
    fn doctor_fixture_resolves_to_doctor_role() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.app_role(), Some(Role::Doctor));
    }

    #[test]
    fn test_token_validates_with_the_same_secret() {
        let config = TestConfig::default();
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

        let validated = validate_token(&token, &config.jwt_secret).expect("token should validate");
        assert_eq!(validated.id, user.id);
        assert!(validate_token(&token, "another-secret").is_err());
    }
}
