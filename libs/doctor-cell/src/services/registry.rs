use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::models::{Doctor, DoctorSeedFile};

/// Read-only lookup over doctor reference data. Injected wherever doctors
/// are resolved so tests can substitute a fixed roster.
pub trait DoctorRegistry: Send + Sync {
    fn all(&self) -> Vec<Doctor>;

    /// Case-insensitive substring match on the doctor's name.
    fn find_by_name(&self, name: &str) -> Option<Doctor>;

    /// Case-insensitive substring match on the department name.
    fn find_by_department(&self, department: &str) -> Vec<Doctor>;

    /// Distinct department names, sorted.
    fn departments(&self) -> Vec<String>;
}

pub struct InMemoryDoctorRegistry {
    doctors: Vec<Doctor>,
}

impl InMemoryDoctorRegistry {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }

    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading doctor seed file: {}", path.display());

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read doctor seed file {}", path.display()))?;
        let seed: DoctorSeedFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse doctor seed file {}", path.display()))?;

        let doctors: Vec<Doctor> = seed.doctors.into_iter().map(Doctor::from).collect();
        info!("Loaded {} doctors from seed file", doctors.len());

        Ok(Self::new(doctors))
    }
}

impl DoctorRegistry for InMemoryDoctorRegistry {
    fn all(&self) -> Vec<Doctor> {
        self.doctors.clone()
    }

    fn find_by_name(&self, name: &str) -> Option<Doctor> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.doctors
            .iter()
            .find(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
    }

    fn find_by_department(&self, department: &str) -> Vec<Doctor> {
        let needle = department.trim().to_lowercase();
        if needle.is_empty() {
            return vec![];
        }
        self.doctors
            .iter()
            .filter(|d| d.department.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    fn departments(&self) -> Vec<String> {
        let mut departments: Vec<String> =
            self.doctors.iter().map(|d| d.department.clone()).collect();
        departments.sort();
        departments.dedup();
        departments
    }
}
