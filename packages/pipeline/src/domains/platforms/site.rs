//! Selector-driven adapter used for every built-in site.
//!
//! A site is described by a static [`SiteProfile`]; [`SiteAdapter`] runs the
//! shared login, apply and probe flows against it.

use async_trait::async_trait;
use tracing::{Instrument, Span};
use url::Url;

use super::adapter::{last_path_segment, ApplyResult, LoginResult, PlatformAdapter};
use super::apply_flow::{self, ApplyLimits, ApplySelectors};
use super::login_flow::{self, LoginSelectors};
use super::Platform;
use crate::common::{ApplyError, AuthError, BrowserError, Pacer, PauseBand};
use crate::domains::applications::{
    ApplicationRecord, ApplicationStatus, JobDetails, PlatformCredentials,
};
use crate::kernel::BasePage;

/// What a posting page shows once loaded.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSelectors {
    /// Missing when the posting has been taken down.
    pub posting: &'static str,
    pub applied_indicator: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub platform: Platform,
    pub login: LoginSelectors,
    pub apply: ApplySelectors,
    pub probe: ProbeSelectors,
    pub job_id: fn(&Url) -> Option<String>,
}

pub struct SiteAdapter {
    profile: &'static SiteProfile,
    limits: ApplyLimits,
    pacer: Pacer,
    span: Span,
}

impl SiteAdapter {
    pub fn new(profile: &'static SiteProfile, limits: ApplyLimits, pacer: Pacer) -> Self {
        let span = tracing::info_span!("adapter", platform = %profile.platform);
        Self {
            profile,
            limits,
            pacer,
            span,
        }
    }

    pub fn profile(&self) -> &'static SiteProfile {
        self.profile
    }
}

#[async_trait]
impl PlatformAdapter for SiteAdapter {
    fn platform(&self) -> Platform {
        self.profile.platform
    }

    async fn login(
        &self,
        page: &dyn BasePage,
        credentials: &PlatformCredentials,
    ) -> Result<LoginResult, AuthError> {
        login_flow::run(
            page,
            self.profile.platform,
            &self.profile.login,
            credentials,
            &self.pacer,
            self.limits.navigation_timeout,
        )
        .instrument(self.span.clone())
        .await
    }

    async fn apply_to_job(
        &self,
        page: &dyn BasePage,
        job: &JobDetails,
        applicant: &PlatformCredentials,
    ) -> Result<ApplyResult, ApplyError> {
        apply_flow::run(
            page,
            &self.profile.apply,
            job,
            applicant,
            &self.limits,
            &self.pacer,
        )
        .instrument(self.span.clone())
        .await
    }

    async fn probe_status(
        &self,
        page: &dyn BasePage,
        application: &ApplicationRecord,
    ) -> Result<Option<ApplicationStatus>, BrowserError> {
        async {
            page.goto(&application.link, self.limits.navigation_timeout)
                .await?;
            self.pacer.pause(PauseBand::PAGE_SETTLE).await;

            if page.query(self.profile.probe.posting).await?.is_none() {
                return Ok(Some(ApplicationStatus::Closed));
            }
            if let Some(indicator) = self.profile.probe.applied_indicator {
                if page.query(indicator).await?.is_some() {
                    return Ok(Some(ApplicationStatus::Applied));
                }
            }
            Ok(Some(application.status))
        }
        .instrument(self.span.clone())
        .await
    }

    fn platform_job_id(&self, url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|parsed| (self.profile.job_id)(&parsed))
            .or_else(|| last_path_segment(url))
    }
}
