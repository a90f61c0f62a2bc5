use std::collections::HashMap;

/// Lifecycle states a fake instance moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Build,
    Active,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct FakeInstance {
    pub id: u64,
    pub name: String,
    pub flavor: String,
    status: InstanceStatus,
    /// Status polls observed in the current state.
    polls: u32,
    pub databases: Vec<String>,
    pub root_password: Option<String>,
}

/// An in-process stand-in for the deployment under test.
///
/// State transitions advance per observation rather than per wall-clock
/// tick: an instance reports BUILD for a fixed number of status calls and
/// then ACTIVE, so polling against it behaves like polling a real,
/// eventually-consistent API without any real waiting.
pub struct FakeControlPlane {
    instances: HashMap<u64, FakeInstance>,
    next_id: u64,
    ready_polls: u32,
    readiness_checks: u32,
    /// Status observations before BUILD turns ACTIVE (and SHUTDOWN
    /// completes deletion).
    transition_polls: u32,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            next_id: 1,
            ready_polls: 2,
            readiness_checks: 0,
            transition_polls: 3,
        }
    }

    /// Whether the control-plane API is accepting requests yet. Reports
    /// false for the first few checks, like a service still starting up.
    pub fn is_ready(&mut self) -> bool {
        self.readiness_checks += 1;
        self.readiness_checks > self.ready_polls
    }

    pub fn create_instance(&mut self, name: &str, flavor: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.instances.insert(
            id,
            FakeInstance {
                id,
                name: name.to_owned(),
                flavor: flavor.to_owned(),
                status: InstanceStatus::Build,
                polls: 0,
                databases: Vec::new(),
                root_password: None,
            },
        );
        id
    }

    /// Observe an instance's status, advancing its state machine.
    /// Returns `None` once the instance is gone.
    pub fn status(&mut self, id: u64) -> Option<InstanceStatus> {
        let transition_polls = self.transition_polls;
        let mut deleted = false;
        let instance = self.instances.get_mut(&id)?;
        let observed = instance.status;
        instance.polls += 1;
        match observed {
            InstanceStatus::Build if instance.polls >= transition_polls => {
                instance.status = InstanceStatus::Active;
                instance.polls = 0;
            }
            InstanceStatus::Shutdown if instance.polls >= transition_polls => {
                deleted = true;
            }
            _ => {}
        }
        if deleted {
            self.instances.remove(&id);
        }
        Some(observed)
    }

    pub fn get(&self, id: u64) -> Option<&FakeInstance> {
        self.instances.get(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Begin deleting an instance. It reports SHUTDOWN for a few more
    /// status observations before disappearing.
    pub fn delete_instance(&mut self, id: u64) -> Result<(), String> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or_else(|| format!("no instance with id {id}"))?;
        instance.status = InstanceStatus::Shutdown;
        instance.polls = 0;
        Ok(())
    }

    /// Provision a database on an instance.
    ///
    /// # Errors
    ///
    /// Errors when the instance is missing, not yet ACTIVE, or already
    /// has a database of that name.
    pub fn add_database(&mut self, id: u64, name: &str) -> Result<(), String> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or_else(|| format!("no instance with id {id}"))?;
        if instance.status != InstanceStatus::Active {
            return Err(format!("instance {id} is not ACTIVE"));
        }
        if instance.databases.iter().any(|db| db == name) {
            return Err(format!("database \"{name}\" already exists on instance {id}"));
        }
        instance.databases.push(name.to_owned());
        Ok(())
    }

    pub fn databases(&self, id: u64) -> Option<&[String]> {
        self.instances.get(&id).map(|i| i.databases.as_slice())
    }

    /// Enable root access, returning the generated password.
    ///
    /// # Errors
    ///
    /// Errors when the instance is missing or not ACTIVE.
    pub fn enable_root(&mut self, id: u64) -> Result<String, String> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or_else(|| format!("no instance with id {id}"))?;
        if instance.status != InstanceStatus::Active {
            return Err(format!("instance {id} is not ACTIVE"));
        }
        let password = format!("root-{id:08x}");
        instance.root_password = Some(password.clone());
        Ok(password)
    }

    pub fn root_enabled(&self, id: u64) -> Option<bool> {
        self.instances.get(&id).map(|i| i.root_password.is_some())
    }

    /// Remove everything, whatever state it is in.
    pub fn purge(&mut self) {
        self.instances.clear();
    }
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self::new()
    }
}
