use url::Url;

use crate::domains::platforms::apply_flow::{ApplicantField, ApplySelectors, FieldSelector};
use crate::domains::platforms::login_flow::{LoginSelectors, DEFAULT_CHALLENGE_MARKERS};
use crate::domains::platforms::site::{ProbeSelectors, SiteProfile};
use crate::domains::platforms::Platform;

pub static PROFILE: SiteProfile = SiteProfile {
    platform: Platform::Glassdoor,
    login: LoginSelectors {
        url: "https://www.glassdoor.com/profile/login_input.htm",
        username: "#inlineUserEmail",
        password: "#inlineUserPassword",
        submit: "button[type=\"submit\"]",
        logged_in_marker: "[data-test=\"user-profile-dropdown-trigger\"]",
        error_banner: Some("[data-test=\"error-message\"]"),
        verification_element: None,
        challenge_markers: DEFAULT_CHALLENGE_MARKERS,
    },
    apply: ApplySelectors {
        quick_apply: "[data-test=\"easyApply\"]",
        dialog: ".ia-BasePage",
        progression: ".ia-continueButton",
        success: ".ia-PostApply",
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
        posting: ".jobDescriptionContent",
        applied_indicator: None,
    },
    job_id,
};

/// Listing pages carry the id in `jl`.
fn job_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "jl")
        .map(|(_, v)| v.into_owned())
}
