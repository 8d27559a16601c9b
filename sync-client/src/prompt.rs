//! Questions the coordinator asks the user.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use inperson_sync_types::Device;

/// User interaction needed while pairing with unknown devices.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// `device` wants to connect. Accept?
    async fn prompt_accept_invite(&self, device: &Device) -> bool;

    /// What should `device` be called? `None` means the user skipped naming.
    async fn prompt_for_name(&self, device: &Device) -> Option<String>;
}

/// Prompter with pre-recorded answers, for tests, the demo and headless
/// nodes.
///
/// Invite answers are taken in order; once exhausted, the default applies.
/// Names are taken in order; once exhausted, the device id is used.
#[derive(Debug, Clone)]
pub struct ScriptedPrompter {
    inner: Arc<Mutex<Script>>,
}

#[derive(Debug)]
struct Script {
    accept_default: bool,
    accept: VecDeque<bool>,
    names: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    /// Accept every invite and name devices after their id.
    pub fn accepting() -> Self {
        Self::with_default(true)
    }

    /// Decline every invite.
    pub fn declining() -> Self {
        Self::with_default(false)
    }

    fn with_default(accept_default: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                accept_default,
                accept: VecDeque::new(),
                names: VecDeque::new(),
                asked: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the answer to the next invite prompt.
    pub fn then_accept(self, accept: bool) -> Self {
        self.lock().accept.push_back(accept);
        self
    }

    /// Queue the answer to the next name prompt.
    pub fn then_name(self, name: impl Into<String>) -> Self {
        self.lock().names.push_back(name.into());
        self
    }

    /// Device ids the user was asked about, in order.
    pub fn asked(&self) -> Vec<String> {
        self.lock().asked.clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt_accept_invite(&self, device: &Device) -> bool {
        let mut script = self.lock();
        script.asked.push(device.id.clone());
        script.accept.pop_front().unwrap_or(script.accept_default)
    }

    async fn prompt_for_name(&self, device: &Device) -> Option<String> {
        let mut script = self.lock();
        Some(script.names.pop_front().unwrap_or_else(|| device.id.clone()))
    }
}
