//! CDN image URL templating.
//!
//! Helix returns profile images at a fixed 300x300 size and box art
//! with literal `{width}x{height}` placeholders; both are rewritten to
//! the sizes the stored rows actually serve.

/// Rewrite a 300x300 profile image URL to a square of `width`.
pub fn set_profile_image_width(profile_image_url: &str, width: u32) -> String {
    profile_image_url.replacen("-300x300.png", &format!("-{width}x{width}.png"), 1)
}

/// Substitute concrete dimensions into a box art URL template.
pub fn set_box_art_size(box_art_url: &str, width: u32, height: u32) -> String {
    box_art_url.replacen("-{width}x{height}", &format!("-{width}x{height}"), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_image_width_is_replaced() {
        let url = "https://static-cdn.jtvnw.net/jtv_user_pictures/5b609411-9eb4-4996-91da-bff6ce94bd55-profile_image-300x300.png";
        let want = "https://static-cdn.jtvnw.net/jtv_user_pictures/5b609411-9eb4-4996-91da-bff6ce94bd55-profile_image-50x50.png";
        assert_eq!(set_profile_image_width(url, 50), want);
    }

    #[test]
    fn box_art_placeholders_are_substituted() {
        let url = "https://static-cdn.jtvnw.net/ttv-boxart/32399_IGDB-{width}x{height}.jpg";
        let want = "https://static-cdn.jtvnw.net/ttv-boxart/32399_IGDB-40x56.jpg";
        assert_eq!(set_box_art_size(url, 40, 56), want);
    }

    #[test]
    fn unrelated_urls_pass_through() {
        let url = "https://example.com/image.png";
        assert_eq!(set_profile_image_width(url, 50), url);
        assert_eq!(set_box_art_size(url, 40, 56), url);
    }
}
