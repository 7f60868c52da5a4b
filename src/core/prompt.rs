/// Joins the non-empty prompt parts with ", ". Falls back to a generic
/// positive prompt when every part is blank.
pub fn build_positive_prompt(quality: &str, visual_base: &str, scene_append: &str) -> String {
    let parts: Vec<&str> = [quality, visual_base, scene_append]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        "high quality, detailed".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_parts_joined() {
        assert_eq!(
            build_positive_prompt("best quality", "1girl, silver hair", "night city"),
            "best quality, 1girl, silver hair, night city"
        );
    }

    #[test]
    fn test_empty_parts_dropped() {
        assert_eq!(
            build_positive_prompt("best quality", "", "  night city  "),
            "best quality, night city"
        );
        assert_eq!(build_positive_prompt("", "portrait", ""), "portrait");
    }

    #[test]
    fn test_all_empty_falls_back() {
        assert_eq!(build_positive_prompt("", "", "   "), "high quality, detailed");
    }
}
