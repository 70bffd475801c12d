//! Role-based visibility of file records.
//!
//! The SQL filter in `PgFileRepository::find_by_project_id_and_role` must agree
//! with [`can_access`]; the in-memory repository used in tests is built on this
//! function so the service tests pin both to the same table.

use crate::features::auth::{Requester, Role};
use crate::features::files::models::File;

/// Decide whether `viewer` may see a file uploaded by `uploaded_by` with `uploader_role`.
///
/// Only OWNER sees records without an uploader role.
pub fn can_access(viewer: &Requester, uploaded_by: &str, uploader_role: Option<Role>) -> bool {
    match viewer.role {
        Some(Role::Owner) => true,
        Some(Role::Contractor) => {
            uploaded_by == viewer.user_id && uploader_role == Some(Role::Contractor)
        }
        Some(Role::Salesperson) => {
            uploaded_by == viewer.user_id && uploader_role == Some(Role::Salesperson)
        }
        Some(Role::Customer) => matches!(
            uploader_role,
            Some(Role::Contractor) | Some(Role::Salesperson)
        ),
        None => false,
    }
}

pub fn can_access_file(viewer: &Requester, file: &File) -> bool {
    can_access(viewer, &file.uploaded_by, file.uploader_role)
}
