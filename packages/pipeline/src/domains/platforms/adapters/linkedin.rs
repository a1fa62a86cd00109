use url::Url;

use crate::domains::platforms::apply_flow::{ApplicantField, ApplySelectors, FieldSelector};
use crate::domains::platforms::login_flow::{LoginSelectors, DEFAULT_CHALLENGE_MARKERS};
use crate::domains::platforms::site::{ProbeSelectors, SiteProfile};
use crate::domains::platforms::Platform;

pub static PROFILE: SiteProfile = SiteProfile {
    platform: Platform::LinkedIn,
    login: LoginSelectors {
        url: "https://www.linkedin.com/login",
        username: "#username",
        password: "#password",
        submit: "button[type=\"submit\"]",
        logged_in_marker: "[data-test-id=\"nav-primary-member-menu-trigger\"]",
        error_banner: Some("#error-for-password"),
        verification_element: Some("#input__phone_verification_pin"),
        challenge_markers: DEFAULT_CHALLENGE_MARKERS,
    },
    apply: ApplySelectors {
        quick_apply: "button[aria-label*=\"Easy Apply\"]",
        dialog: "[role=\"dialog\"]",
        progression: "button[aria-label=\"Continue to next step\"], button[aria-label=\"Continue\"], \
                      button[aria-label=\"Review your application\"], button[aria-label=\"Submit application\"]",
        success: "[data-test-id=\"application-submitted\"], .artdeco-inline-feedback--success",
        fields: &[
            FieldSelector {
                selector: "input[name=\"phoneNumber\"]",
                field: ApplicantField::Phone,
            },
            FieldSelector {
                selector: "input[name=\"firstName\"]",
                field: ApplicantField::FirstName,
            },
            FieldSelector {
                selector: "input[name=\"lastName\"]",
                field: ApplicantField::LastName,
            },
        ],
        resume_upload: Some("input[type=\"file\"]"),
        method: "Easy Apply",
    },
    probe: ProbeSelectors {
        posting: ".jobs-search__job-detail--wrapper",
        applied_indicator: Some(".jobs-apply-button--applied"),
    },
    job_id,
};

/// `/jobs/view/{id}` or `?currentJobId={id}`.
fn job_id(url: &Url) -> Option<String> {
    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "currentJobId") {
        return Some(id.into_owned());
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .windows(3)
        .find(|w| w[0] == "jobs" && w[1] == "view")
        .map(|w| w[2].to_string())
}
