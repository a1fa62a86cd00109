//! Built-in site profiles.

pub mod glassdoor;
pub mod indeed;
pub mod linkedin;
pub mod monster;
pub mod naukri;

use super::site::SiteProfile;
use super::Platform;

pub fn profile(platform: Platform) -> &'static SiteProfile {
    match platform {
        Platform::LinkedIn => &linkedin::PROFILE,
        Platform::Indeed => &indeed::PROFILE,
        Platform::Naukri => &naukri::PROFILE,
        Platform::Monster => &monster::PROFILE,
        Platform::Glassdoor => &glassdoor::PROFILE,
    }
}
