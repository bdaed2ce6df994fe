//! Caller authorization.
//!
//! Only administrators may trigger a round. The caller arrives as an
//! authenticated email; its user id is the local part before `@`, which
//! must name an admin user document.

use mistletoe_core::ParticipantId;

use crate::{config::EngineConfig, error::TriggerError, storage::Store};

/// Authenticated principal making a trigger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    principal: String,
}

impl Caller {
    /// Wrap an authenticated principal.
    pub fn new(principal: impl Into<String>) -> Self {
        Self { principal: principal.into() }
    }

    /// The principal as given.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// User id derived from the principal.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Unauthorized` when the principal is not an
    /// email or its local part is empty.
    pub fn user_id(&self) -> Result<ParticipantId, TriggerError> {
        let Some((local, _domain)) = self.principal.split_once('@') else {
            return Err(TriggerError::unauthorized("invalid user email format"));
        };
        if local.trim().is_empty() {
            return Err(TriggerError::unauthorized("invalid user email format"));
        }
        Ok(ParticipantId::new(local))
    }

    fn domain(&self) -> Option<&str> {
        self.principal.split_once('@').map(|(_, domain)| domain)
    }
}

/// Resolve the caller to an administrator id.
///
/// # Errors
///
/// Returns `TriggerError::Unauthorized` when the caller is missing, malformed,
/// outside the configured admin domain, unknown, or not an administrator.
pub(crate) fn authorize(
    store: &impl Store,
    caller: Option<&Caller>,
    config: &EngineConfig,
) -> Result<ParticipantId, TriggerError> {
    let caller = caller
        .ok_or_else(|| TriggerError::unauthorized("must be authenticated to trigger pairing"))?;

    if let Some(required) = config.admin_email_domain.as_deref() {
        if !caller.domain().is_some_and(|domain| domain.eq_ignore_ascii_case(required)) {
            return Err(TriggerError::unauthorized(format!(
                "{} is not an address in {}",
                caller.principal(),
                required
            )));
        }
    }

    let user_id = caller.user_id()?;
    let user = store
        .load_user(&user_id)?
        .ok_or_else(|| TriggerError::unauthorized(format!("no user document for {user_id}")))?;

    if !user.is_admin {
        return Err(TriggerError::unauthorized("only admin users can trigger pairing"));
    }

    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UserRecord};

    fn store() -> MemoryStore {
        MemoryStore::with_users([
            UserRecord::admin("admin", "Admin"),
            UserRecord::participant("alice", "Alice"),
        ])
    }

    fn authorize_as(
        principal: Option<&str>,
        config: &EngineConfig,
    ) -> Result<ParticipantId, TriggerError> {
        let caller = principal.map(Caller::new);
        authorize(&store(), caller.as_ref(), config)
    }

    #[test]
    fn email_maps_to_local_part() {
        assert_eq!(Caller::new("admin@example.org").user_id().unwrap(), "admin".into());
        assert!(Caller::new("@example.org").user_id().is_err());
    }

    #[test]
    fn bare_id_is_not_an_email() {
        let err = Caller::new("admin").user_id().unwrap_err();
        assert!(matches!(
            &err,
            TriggerError::Unauthorized { reason } if reason == "invalid user email format"
        ));

        let result = authorize_as(Some("admin"), &EngineConfig::default());
        assert!(matches!(result, Err(TriggerError::Unauthorized { .. })));
    }

    #[test]
    fn admin_is_authorized() {
        let id = authorize_as(Some("admin@example.org"), &EngineConfig::default()).unwrap();
        assert_eq!(id, "admin".into());
    }

    #[test]
    fn missing_caller_is_unauthorized() {
        let result = authorize_as(None, &EngineConfig::default());
        assert!(matches!(result, Err(TriggerError::Unauthorized { .. })));
    }

    #[test]
    fn participant_is_unauthorized() {
        let result = authorize_as(Some("alice@example.org"), &EngineConfig::default());
        assert!(
            matches!(result, Err(TriggerError::Unauthorized { reason }) if reason.contains("admin"))
        );
    }

    #[test]
    fn unknown_user_is_unauthorized() {
        let result = authorize_as(Some("mallory@example.org"), &EngineConfig::default());
        assert!(matches!(result, Err(TriggerError::Unauthorized { .. })));
    }

    #[test]
    fn admin_domain_is_enforced() {
        let config =
            EngineConfig { admin_email_domain: Some("example.org".to_string()), ..EngineConfig::default() };

        assert!(authorize_as(Some("admin@EXAMPLE.org"), &config).is_ok());
        assert!(authorize_as(Some("admin@elsewhere.net"), &config).is_err());
        assert!(authorize_as(Some("admin"), &config).is_err());
    }
}
