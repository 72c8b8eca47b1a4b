use std::sync::Arc;
use std::time::Duration;

use appointment_cell::{
    AppointmentService, AppointmentState, AppointmentStore, AvailabilityService, Clock, ReminderService,
    SupabaseAppointmentStore, SystemClock,
};
use doctor_cell::{DoctorDirectory, SupabaseDoctorDirectory};
use notification_queue_cell::connect_gateway;
use patient_cell::{PatientDirectory, SupabasePatientDirectory};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::Role;
use shared_utils::cache::{Cache, TtlCache};
use shared_utils::extractor::{AuthState, SupabaseRoleLookup};

/// Wires the Supabase-backed directories and store, the notification queue
/// and the role cache into the state shared by every handler.
pub async fn build_state(config: &AppConfig) -> Arc<AppointmentState> {
    let supabase = Arc::new(SupabaseClient::new(config));

    let doctors: Arc<dyn DoctorDirectory> = Arc::new(SupabaseDoctorDirectory::new(supabase.clone()));
    let patients: Arc<dyn PatientDirectory> = Arc::new(SupabasePatientDirectory::new(supabase.clone()));
    let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = connect_gateway(config).await;

    let roles: Arc<dyn Cache<String, Role>> =
        Arc::new(TtlCache::new(Duration::from_secs(config.role_cache_ttl_seconds)));
    let auth = Arc::new(AuthState::new(
        config.supabase_jwt_secret.clone(),
        roles,
        Arc::new(SupabaseRoleLookup::new(supabase)),
    ));

    Arc::new(AppointmentState {
        appointments: Arc::new(AppointmentService::new(
            doctors.clone(),
            patients.clone(),
            store.clone(),
            clock.clone(),
            config.meeting_base_url.clone(),
        )),
        availability: Arc::new(AvailabilityService::new(doctors.clone(), store.clone(), clock.clone())),
        reminders: Arc::new(ReminderService::new(
            store,
            patients,
            doctors,
            gateway,
            clock,
            config.reminder.clone(),
        )),
        auth,
    })
}
