// libs/doctor-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::Doctor;

const DOCTOR_COLUMNS: &str = "id,first_name,last_name,working_hours,buffer_minutes,consultation_duration_minutes,max_daily_appointments,is_available";

/// Read access to doctor scheduling profiles.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>, DatabaseError>;
}

pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>, DatabaseError> {
        debug!("Fetching doctor {}", id);

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", id, DOCTOR_COLUMNS);
        let doctors: Vec<Doctor> = self.supabase.select(&path).await?;

        Ok(doctors.into_iter().next())
    }
}

/// Process-local directory, used by tests and local runs without Supabase.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        let directory = Self::new();
        for doctor in doctors {
            directory.upsert(doctor);
        }
        directory
    }

    pub fn upsert(&self, doctor: Doctor) {
        if let Ok(mut doctors) = self.doctors.write() {
            doctors.insert(doctor.id, doctor);
        }
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>, DatabaseError> {
        let doctors = self
            .doctors
            .read()
            .map_err(|_| DatabaseError::Transport("doctor directory lock poisoned".to_string()))?;
        Ok(doctors.get(&id).cloned())
    }
}
