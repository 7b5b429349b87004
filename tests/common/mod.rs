#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlprov::admin::types::{DatabaseInstance, ExecuteSqlPayload, ExecuteSqlResponse};
use sqlprov::admin::{AdminError, SqlAdminApi};
use sqlprov::provision::{ProvisionTimeouts, Provisioner};
use sqlprov::state::lock::InstanceLockManager;

/// In-memory admin API that records every call.
#[derive(Default)]
pub struct FakeSqlAdmin {
    /// instance -> activation policy. Unknown instances are not found.
    instances: Mutex<HashMap<String, String>>,
    /// Remaining get_instance calls answered with "operation in progress".
    busy_remaining: AtomicU32,
    /// Terminal error returned by get_instance.
    get_error: Mutex<Option<AdminError>>,
    /// Scripted execute_sql result; success when unset.
    exec_result: Mutex<Option<Result<ExecuteSqlResponse, AdminError>>>,
    /// Artificial latency of each call.
    delay: Mutex<Duration>,

    pub get_calls: AtomicU32,
    pub exec_calls: AtomicU32,
    pub payloads: Mutex<Vec<(String, ExecuteSqlPayload)>>,

    active: Mutex<HashMap<String, u32>>,
    max_active_per_instance: Mutex<HashMap<String, u32>>,
    active_total: AtomicU32,
    pub max_active_total: AtomicU32,
}

impl FakeSqlAdmin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_instance(self: Arc<Self>, instance: &str, policy: &str) -> Arc<Self> {
        self.instances
            .lock()
            .unwrap()
            .insert(instance.to_string(), policy.to_string());
        self
    }

    pub fn busy_for(self: Arc<Self>, calls: u32) -> Arc<Self> {
        self.busy_remaining.store(calls, Ordering::SeqCst);
        self
    }

    pub fn failing_get(self: Arc<Self>, err: AdminError) -> Arc<Self> {
        *self.get_error.lock().unwrap() = Some(err);
        self
    }

    pub fn exec_returns(self: Arc<Self>, result: Result<ExecuteSqlResponse, AdminError>) -> Arc<Self> {
        *self.exec_result.lock().unwrap() = Some(result);
        self
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn gets(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn execs(&self) -> u32 {
        self.exec_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self, instance: &str) -> u32 {
        self.max_active_per_instance
            .lock()
            .unwrap()
            .get(instance)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, instance: &str) {
        let mut active = self.active.lock().unwrap();
        let n = active.entry(instance.to_string()).or_insert(0);
        *n += 1;
        let mut max = self.max_active_per_instance.lock().unwrap();
        let m = max.entry(instance.to_string()).or_insert(0);
        *m = (*m).max(*n);

        let total = self.active_total.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_total.fetch_max(total, Ordering::SeqCst);
    }

    fn leave(&self, instance: &str) {
        if let Some(n) = self.active.lock().unwrap().get_mut(instance) {
            *n = n.saturating_sub(1);
        }
        self.active_total.fetch_sub(1, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SqlAdminApi for FakeSqlAdmin {
    async fn get_instance(
        &self,
        project: &str,
        instance: &str,
    ) -> Result<DatabaseInstance, AdminError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let busy = self
            .busy_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(AdminError::operation_in_progress(
                "Operation failed because another operation was already in progress.",
            ));
        }
        if let Some(err) = self.get_error.lock().unwrap().clone() {
            return Err(err);
        }

        let policy = self.instances.lock().unwrap().get(instance).cloned();
        match policy {
            Some(policy) => {
                // The critical section spans the status check and the execution.
                if policy == "ALWAYS" {
                    self.enter(instance);
                }
                Ok(DatabaseInstance::with_activation_policy(instance, &policy))
            }
            None => Err(AdminError::NotFound {
                project: project.to_string(),
                instance: instance.to_string(),
            }),
        }
    }

    async fn execute_sql(
        &self,
        _project: &str,
        instance: &str,
        payload: &ExecuteSqlPayload,
    ) -> Result<ExecuteSqlResponse, AdminError> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .lock()
            .unwrap()
            .push((instance.to_string(), payload.clone()));
        self.pause().await;
        self.leave(instance);

        match self.exec_result.lock().unwrap().clone() {
            Some(result) => result,
            None => Ok(ExecuteSqlResponse::ok()),
        }
    }
}

pub fn fast_timeouts() -> ProvisionTimeouts {
    ProvisionTimeouts {
        create: Duration::from_secs(5),
        read: Duration::from_millis(300),
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(25),
    }
}

pub fn provisioner(admin: Arc<FakeSqlAdmin>) -> Provisioner {
    provisioner_with(admin, Arc::new(InstanceLockManager::new()), fast_timeouts())
}

pub fn provisioner_with(
    admin: Arc<FakeSqlAdmin>,
    locks: Arc<InstanceLockManager>,
    timeouts: ProvisionTimeouts,
) -> Provisioner {
    let admin: Arc<dyn SqlAdminApi> = admin;
    Provisioner::new(admin, locks, timeouts)
}
