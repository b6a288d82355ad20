//! Mechanical payload assessment.
//!
//! A cheap, deterministic gate that runs before any oracle call: pages with
//! enough text stand on their own, short pages can be rescued by carrying
//! assets, and everything else is too thin to normalize.

use crate::models::{PayloadMetrics, PayloadPolicy, PayloadStatus};

/// Grade extracted content against a source's payload policy.
pub fn assess(text_chars: u64, links: u32, images: u32, policy: &PayloadPolicy) -> PayloadMetrics {
    let assets = links.saturating_add(images);
    let status = if text_chars >= policy.min_text_chars {
        PayloadStatus::Ok
    } else if text_chars >= policy.warn_text_chars || assets >= policy.min_assets {
        PayloadStatus::Weak
    } else {
        PayloadStatus::TooThin
    };

    PayloadMetrics {
        status,
        text_chars,
        links,
        images,
        assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PayloadPolicy {
        PayloadPolicy::default()
    }

    #[test]
    fn test_rich_text_is_ok() {
        assert_eq!(assess(600, 0, 0, &policy()).status, PayloadStatus::Ok);
        assert_eq!(assess(5000, 3, 2, &policy()).status, PayloadStatus::Ok);
    }

    #[test]
    fn test_boundary_below_min_is_not_ok() {
        let metrics = assess(599, 0, 0, &policy());
        assert_eq!(metrics.status, PayloadStatus::Weak);
        assert_eq!(metrics.text_chars, 599);
    }

    #[test]
    fn test_short_text_with_assets_is_weak() {
        // 100 chars is under the warn threshold, but two assets rescue it.
        assert_eq!(assess(100, 1, 1, &policy()).status, PayloadStatus::Weak);
        assert_eq!(assess(0, 2, 0, &policy()).status, PayloadStatus::Weak);
        assert_eq!(assess(0, 0, 2, &policy()).status, PayloadStatus::Weak);
    }

    #[test]
    fn test_warn_threshold_alone_is_weak() {
        assert_eq!(assess(160, 0, 0, &policy()).status, PayloadStatus::Weak);
        assert_eq!(assess(200, 0, 0, &policy()).status, PayloadStatus::Weak);
    }

    #[test]
    fn test_thin_page_is_too_thin() {
        assert_eq!(assess(159, 1, 0, &policy()).status, PayloadStatus::TooThin);
        assert_eq!(assess(0, 0, 0, &policy()).status, PayloadStatus::TooThin);
        assert_eq!(assess(50, 0, 1, &policy()).status, PayloadStatus::TooThin);
    }

    #[test]
    fn test_metrics_carry_inputs() {
        let metrics = assess(42, 3, 4, &policy());
        assert_eq!(metrics.text_chars, 42);
        assert_eq!(metrics.links, 3);
        assert_eq!(metrics.images, 4);
        assert_eq!(metrics.assets, 7);
    }

    #[test]
    fn test_custom_policy_thresholds() {
        let policy = PayloadPolicy {
            min_text_chars: 100,
            warn_text_chars: 20,
            min_assets: 5,
            enforce: true,
        };
        assert_eq!(assess(100, 0, 0, &policy).status, PayloadStatus::Ok);
        assert_eq!(assess(20, 0, 0, &policy).status, PayloadStatus::Weak);
        assert_eq!(assess(19, 2, 2, &policy).status, PayloadStatus::TooThin);
        assert_eq!(assess(19, 3, 2, &policy).status, PayloadStatus::Weak);
    }
}
