use url::Url;

use crate::domains::platforms::apply_flow::{ApplicantField, ApplySelectors, FieldSelector};
use crate::domains::platforms::login_flow::{LoginSelectors, DEFAULT_CHALLENGE_MARKERS};
use crate::domains::platforms::site::{ProbeSelectors, SiteProfile};
use crate::domains::platforms::Platform;

pub static PROFILE: SiteProfile = SiteProfile {
    platform: Platform::Indeed,
    login: LoginSelectors {
        url: "https://secure.indeed.com/auth",
        username: "input[type=\"email\"]",
        password: "input[type=\"password\"]",
        submit: "button[type=\"submit\"]",
        logged_in_marker: "#AccountMenu",
        error_banner: Some("[data-testid=\"auth-page-error\"]"),
        verification_element: Some("input[name=\"verificationCode\"]"),
        challenge_markers: DEFAULT_CHALLENGE_MARKERS,
    },
    apply: ApplySelectors {
        quick_apply: "#indeedApplyButton",
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
        method: "Indeed Apply",
    },
    probe: ProbeSelectors {
        posting: "[data-jk]",
        applied_indicator: Some("button[aria-label*=\"Applied\"]"),
    },
    job_id,
};

/// Postings are addressed by the `jk` query parameter.
fn job_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "jk")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_from_jk_param() {
        let url = Url::parse("https://www.indeed.com/viewjob?jk=5f1c2d3e4b&from=serp").unwrap();
        assert_eq!(job_id(&url), Some("5f1c2d3e4b".to_string()));
    }
}
