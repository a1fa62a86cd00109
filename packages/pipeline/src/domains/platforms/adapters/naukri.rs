use url::Url;

use crate::domains::platforms::apply_flow::{ApplicantField, ApplySelectors, FieldSelector};
use crate::domains::platforms::login_flow::{LoginSelectors, DEFAULT_CHALLENGE_MARKERS};
use crate::domains::platforms::site::{ProbeSelectors, SiteProfile};
use crate::domains::platforms::Platform;

pub static PROFILE: SiteProfile = SiteProfile {
    platform: Platform::Naukri,
    login: LoginSelectors {
        url: "https://www.naukri.com/nlogin/login",
        username: "#usernameField",
        password: "#passwordField",
        submit: "button[type=\"submit\"]",
        logged_in_marker: ".nI-gNb-drawer__icon",
        error_banner: Some(".err-container"),
        verification_element: None,
        challenge_markers: DEFAULT_CHALLENGE_MARKERS,
    },
    apply: ApplySelectors {
        quick_apply: "#apply-button",
        dialog: ".chatbot_DrawerContentWrapper",
        progression: ".sendMsg",
        success: ".apply-message",
        fields: &[FieldSelector {
            selector: "input[name=\"mobile\"]",
            field: ApplicantField::Phone,
        }],
        resume_upload: None,
        method: "Naukri Apply",
    },
    probe: ProbeSelectors {
        posting: ".jd-header",
        applied_indicator: Some("#already-applied"),
    },
    job_id,
};

/// Naukri slugs end in `-{id}`, e.g. `/job-listings-rust-developer-acme-pune-3-to-5-years-010125000123`.
fn job_id(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let id = last.rsplit('-').next()?;
    id.chars().all(|c| c.is_ascii_digit()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_from_slug_suffix() {
        let url = Url::parse(
            "https://www.naukri.com/job-listings-rust-developer-acme-pune-3-to-5-years-010125000123",
        )
        .unwrap();
        assert_eq!(job_id(&url), Some("010125000123".to_string()));
    }
}
