//! Curated keyword to tag table.
//!
//! Keywords are matched as substrings of lowercase-folded content, so every
//! key here must already be lowercase.

/// Keyword table entry: keyword and the canonical tags it implies.
pub type KeywordEntry = (&'static str, &'static [&'static str]);

/// Default keyword dictionary grouped by topical domain.
pub static DEFAULT_KEYWORDS: &[KeywordEntry] = &[
    // Entertainment
    ("搞笑", &["entertainment", "funny", "comedy"]),
    ("幽默", &["entertainment", "funny", "humor"]),
    ("段子", &["entertainment", "funny", "joke"]),
    ("相声", &["entertainment", "comedy", "crosstalk"]),
    ("小品", &["entertainment", "comedy", "sketch"]),
    // Music
    ("音乐", &["music", "entertainment"]),
    ("唱歌", &["music", "singing", "entertainment"]),
    ("歌曲", &["music", "song", "entertainment"]),
    ("乐器", &["music", "instrument"]),
    ("钢琴", &["music", "piano"]),
    ("吉他", &["music", "guitar"]),
    ("舞蹈", &["music", "dance", "entertainment"]),
    // Food
    ("美食", &["food", "cooking", "lifestyle"]),
    ("做饭", &["food", "cooking", "lifestyle"]),
    ("烹饪", &["food", "cooking", "lifestyle"]),
    ("菜谱", &["food", "recipe", "cooking"]),
    ("甜品", &["food", "dessert", "sweet"]),
    ("火锅", &["food", "hotpot", "chinese"]),
    // Sports
    ("运动", &["sports", "fitness", "health"]),
    ("健身", &["sports", "fitness", "health"]),
    ("跑步", &["sports", "running", "health"]),
    ("瑜伽", &["sports", "yoga", "health"]),
    ("篮球", &["sports", "basketball"]),
    ("足球", &["sports", "football"]),
    // Technology
    ("科技", &["technology", "tech"]),
    ("手机", &["technology", "mobile", "phone"]),
    ("电脑", &["technology", "computer"]),
    ("编程", &["technology", "programming", "coding"]),
    ("ai", &["technology", "ai", "artificial-intelligence"]),
    ("人工智能", &["technology", "ai", "artificial-intelligence"]),
    // Education
    ("教育", &["education", "learning"]),
    ("学习", &["education", "learning"]),
    ("知识", &["education", "knowledge"]),
    ("英语", &["education", "english", "language"]),
    ("数学", &["education", "math"]),
    ("历史", &["education", "history"]),
    // Lifestyle
    ("生活", &["lifestyle", "daily"]),
    ("日常", &["lifestyle", "daily"]),
    ("穿搭", &["lifestyle", "fashion", "outfit"]),
    ("化妆", &["lifestyle", "makeup", "beauty"]),
    ("护肤", &["lifestyle", "skincare", "beauty"]),
    ("旅行", &["lifestyle", "travel"]),
    ("旅游", &["lifestyle", "travel"]),
    // Gaming
    ("游戏", &["gaming", "entertainment"]),
    ("手游", &["gaming", "mobile-game", "entertainment"]),
    ("电竞", &["gaming", "esports", "entertainment"]),
    ("王者荣耀", &["gaming", "mobile-game", "moba"]),
    ("原神", &["gaming", "mobile-game", "rpg"]),
    // Emotion
    ("爱情", &["emotion", "love", "relationship"]),
    ("恋爱", &["emotion", "love", "relationship"]),
    ("分手", &["emotion", "breakup", "relationship"]),
    ("友情", &["emotion", "friendship"]),
    ("家庭", &["emotion", "family"]),
    // Pets and animals
    ("宠物", &["pet", "animal", "lifestyle"]),
    ("狗", &["pet", "dog", "animal"]),
    ("猫", &["pet", "cat", "animal"]),
    ("动物", &["animal", "nature"]),
    // Fashion and beauty
    ("时尚", &["fashion", "style", "lifestyle"]),
    ("美妆", &["beauty", "makeup", "fashion"]),
    ("服装", &["fashion", "clothing", "style"]),
    ("潮流", &["fashion", "trend", "style"]),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_keywords_are_lowercase() {
        for (keyword, _) in DEFAULT_KEYWORDS {
            assert_eq!(*keyword, keyword.to_lowercase(), "keyword {keyword}");
        }
    }

    #[test]
    fn test_keywords_are_unique_and_mapped() {
        let mut seen = HashSet::new();
        for (keyword, tags) in DEFAULT_KEYWORDS {
            assert!(seen.insert(*keyword), "duplicate keyword {keyword}");
            assert!(!tags.is_empty(), "keyword {keyword} maps to no tags");
        }
    }
}
