// Centralized logging for session issuance. Cookie values and tokens are never logged.
use log::{debug, info, warn};

use crate::session::cookie::CookieScheme;
use crate::session::error::SessionError;
use crate::session::issuer::IssueStage;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a completed issuance
    pub fn log_session_issued(user_id: &str, scheme: CookieScheme, remember: bool, directives: usize) {
        info!(
            "Issued {scheme} session for user '{user_id}' (remember={remember}, cookies={directives})"
        );
    }

    /// Log a renewal that reused a caller-supplied token
    pub fn log_session_renewed(user_id: &str) {
        debug!("Renewing session for user '{user_id}' with existing token");
    }

    /// Log that the veto suppressed cookie emission
    pub fn log_emission_vetoed(user_id: &str) {
        if user_id.is_empty() {
            info!("Cookie clearing suppressed by emit hook");
        } else {
            info!("Cookie emission for user '{user_id}' suppressed by emit hook; session token kept");
        }
    }

    /// Log an aborted issuance
    pub fn log_issuance_failed(user_id: &str, stage: IssueStage, error: &SessionError) {
        warn!("Session issuance for user '{user_id}' aborted at {stage}: {error}");
    }

    /// Log cookies being cleared
    pub fn log_cookies_cleared(directives: usize) {
        info!("Clearing session cookies ({directives} directives)");
    }

    /// Log a revoked session
    pub fn log_session_revoked(user_id: &str) {
        info!("Revoked session for user '{user_id}'");
    }

    /// Log a rejected cookie; bad client cookies are routine, server-side failures are not
    pub fn log_validation_failed(scheme: CookieScheme, error: &SessionError) {
        if error.is_client_error() {
            debug!("Rejected {scheme} cookie: {error}");
        } else {
            warn!("Could not validate {scheme} cookie: {error}");
        }
    }
}
