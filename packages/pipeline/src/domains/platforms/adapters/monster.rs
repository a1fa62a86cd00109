use url::Url;

use crate::domains::platforms::adapter::last_path_segment;
use crate::domains::platforms::apply_flow::{ApplicantField, ApplySelectors, FieldSelector};
use crate::domains::platforms::login_flow::{LoginSelectors, DEFAULT_CHALLENGE_MARKERS};
use crate::domains::platforms::site::{ProbeSelectors, SiteProfile};
use crate::domains::platforms::Platform;

pub static PROFILE: SiteProfile = SiteProfile {
    platform: Platform::Monster,
    login: LoginSelectors {
        url: "https://www.monster.com/profile/sign-in",
        username: "#email",
        password: "#password",
        submit: "button[type=\"submit\"]",
        logged_in_marker: "[data-testid=\"header-profile-menu\"]",
        error_banner: Some("[data-testid=\"login-error\"]"),
        verification_element: None,
        challenge_markers: DEFAULT_CHALLENGE_MARKERS,
    },
    apply: ApplySelectors {
        quick_apply: "[data-testid=\"quick-apply-button\"]",
        dialog: "[data-testid=\"apply-modal\"]",
        progression: "[data-testid=\"apply-modal\"] button[type=\"submit\"]",
        success: "[data-testid=\"apply-success\"]",
        fields: &[
            FieldSelector {
                selector: "input[name=\"phone\"]",
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
        method: "Quick Apply",
    },
    probe: ProbeSelectors {
        posting: ".job-tittle",
        applied_indicator: None,
    },
    job_id,
};

/// `/job-openings/{slug}--{id}`.
fn job_id(url: &Url) -> Option<String> {
    let last = last_path_segment(url.as_str())?;
    Some(match last.rsplit_once("--") {
        Some((_, id)) => id.to_string(),
        None => last,
    })
}
