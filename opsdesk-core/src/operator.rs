use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved acting-user context.
///
/// Authentication happens upstream; by the time a request reaches the engine
/// the caller has already been resolved to a user id and, when the user is a
/// field technician, the linked technician record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub user_id: Uuid,
    pub display_name: String,
    pub technician_id: Option<Uuid>,
}

impl Operator {
    pub fn new(user_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            technician_id: None,
        }
    }

    pub fn with_technician(mut self, technician_id: Uuid) -> Self {
        self.technician_id = Some(technician_id);
        self
    }
}
