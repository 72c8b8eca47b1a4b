use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::Patient;

/// Read access to patient records.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError>;
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError> {
        debug!("Fetching patient {}", id);

        let path = format!(
            "/rest/v1/patients?id=eq.{}&select=id,first_name,last_name,email,phone_number",
            id
        );
        let patients: Vec<Patient> = self.supabase.select(&path).await?;

        Ok(patients.into_iter().next())
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        let directory = Self::new();
        for patient in patients {
            directory.upsert(patient);
        }
        directory
    }

    pub fn upsert(&self, patient: Patient) {
        if let Ok(mut patients) = self.patients.write() {
            patients.insert(patient.id, patient);
        }
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError> {
        let patients = self
            .patients
            .read()
            .map_err(|_| DatabaseError::Transport("patient directory lock poisoned".to_string()))?;
        Ok(patients.get(&id).cloned())
    }
}
