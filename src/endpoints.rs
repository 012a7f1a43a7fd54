//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/ledger/{ledger_id}', use [format_endpoint].

/// The root route which redirects to the ledger page of the default team.
pub const ROOT: &str = "/";
/// The page listing a team's ledger entries.
pub const LEDGER_VIEW: &str = "/{team_id}/ledger";
/// The page listing a team's sources.
pub const SOURCES_VIEW: &str = "/{team_id}/sources";
/// The page listing a team's categories.
pub const CATEGORIES_VIEW: &str = "/{team_id}/categories";

/// The route that triggers email ingestion for a source.
pub const FETCH_EMAIL: &str = "/api/fetch-email/{source_id}";
/// The route to create a source from a JSON body.
pub const CREATE_SOURCE: &str = "/api/create-source";
/// The route for the create form on the sources page.
pub const POST_SOURCE: &str = "/api/sources";
/// The route to create a user.
pub const CREATE_USER: &str = "/api/create-user";
/// The route to create a category.
pub const POST_CATEGORY: &str = "/api/categories";
/// The route to manually edit a ledger entry.
pub const EDIT_LEDGER_ENTRY: &str = "/api/ledger/{ledger_id}";

/// The Gmail web UI link for a message, `{email_id}` is the Gmail message ID.
pub const GMAIL_MESSAGE_LINK: &str = "https://mail.google.com/mail/#inbox/{email_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/{team_id}/ledger', '{team_id}' is the parameter.
///
/// This function assumes that an endpoint path contains a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
