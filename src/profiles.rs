//! Human-readable segment profiles
//!
//! Profile `i` describes cluster `i`. The post-fit alignment step in
//! [`crate::model`] keeps that correspondence stable across retrains.

use serde::Serialize;

/// Number of customer segments (the `k` of the clustering model).
pub const SEGMENT_COUNT: usize = 5;

/// Channel, offer and product suggestions for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub products: &'static [&'static str],
    pub offers: &'static [&'static str],
    pub channels: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentProfile {
    pub id: usize,
    pub name: &'static str,
    pub description: &'static str,
    pub marketing: &'static str,
    pub recommendations: Recommendations,
}

pub const PROFILES: [SegmentProfile; SEGMENT_COUNT] = [
    SegmentProfile {
        id: 0,
        name: "Premium customers",
        description: "High income, large spend across every product category, strong brand loyalty",
        marketing: "VIP programs, personal offers, exclusive events, a dedicated account manager",
        recommendations: Recommendations {
            products: &["Premium wine", "Delicatessen", "Exclusive collections"],
            offers: &["VIP program", "Personal manager", "Private sales"],
            channels: &["Personalized email", "SMS about exclusives", "Personal account page"],
        },
    },
    SegmentProfile {
        id: 1,
        name: "Economical rationalists",
        description: "Average income, price sensitive, deliberate purchases, compare offers",
        marketing: "Discounts, coupons, cashback programs, two-for-one deals, clearance sales",
        recommendations: Recommendations {
            products: &["Discounted goods", "Promotional offers", "Staple products"],
            offers: &["Discount coupons", "5% cashback", "Wholesale prices"],
            channels: &["Email with promo codes", "Discount push notifications", "Telegram"],
        },
    },
    SegmentProfile {
        id: 2,
        name: "Young professionals",
        description: "Active online shoppers, average to high income, follow trends, love new products",
        marketing: "Mobile app, social media, fast delivery, influencer marketing, online promotions",
        recommendations: Recommendations {
            products: &["Tech novelties", "Ready-made meals", "Online services"],
            offers: &["Fast delivery", "Subscriptions", "Cashless payment"],
            channels: &["Mobile app", "Instagram", "YouTube"],
        },
    },
    SegmentProfile {
        id: 3,
        name: "Family shoppers",
        description: "Regular purchases for children and home, average income, value convenience",
        marketing: "Family bundles, discounts on children's goods, loyalty programs, convenient delivery",
        recommendations: Recommendations {
            products: &["Children's goods", "Household products", "Family packs"],
            offers: &["Family card", "Discount on the second item", "Bonuses"],
            channels: &["Email newsletter", "Viber", "SMS"],
        },
    },
    SegmentProfile {
        id: 4,
        name: "Occasional shoppers",
        description: "Irregular purchases, low loyalty, varied income, weak response to marketing",
        marketing: "Welcome bonuses, reactivation offers, retargeting, personal discounts",
        recommendations: Recommendations {
            products: &["Popular products", "Seasonal offers", "New arrivals"],
            offers: &["First purchase discount", "Free delivery", "Gift"],
            channels: &["Retargeting", "Reactivation email", "Google Ads"],
        },
    },
];

/// Name reported when a survey could not be classified.
pub const UNDETERMINED_NAME: &str = "Undetermined";
pub const UNDETERMINED_DESCRIPTION: &str = "Temporary technical failure while determining the segment";
pub const UNDETERMINED_MARKETING: &str = "Standard strategy";

pub fn profile(id: usize) -> Option<&'static SegmentProfile> {
    PROFILES.get(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_ids_match_positions() {
        for (i, p) in PROFILES.iter().enumerate() {
            assert_eq!(p.id, i);
            assert!(!p.recommendations.products.is_empty());
        }
        assert!(profile(SEGMENT_COUNT).is_none());
    }
}
