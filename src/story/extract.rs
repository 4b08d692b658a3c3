//! 章节元数据提取
//!
//! key_plot_points：固定词表的子串命中集合，无命中时回退为单条通用剧情点；
//! character_changes / next_chapter_setup / summary：开篇章节查表，其余章节用通用模板。

/// (触发子串, 剧情点)，按表中顺序输出
pub const PLOT_TRIGGERS: &[(&str, &str)] = &[
    ("修仙", "修仙相关情节"),
    ("青云门", "青云门相关"),
    ("灵根", "天赋展现"),
    ("考核", "入门考核"),
];

pub const FALLBACK_PLOT_POINT: &str = "主要剧情推进";

/// 开篇章节的固定元数据
#[derive(Debug, Clone, Copy)]
pub struct ChapterNotes {
    pub chapter_number: u32,
    pub character_changes: &'static [&'static str],
    pub next_chapter_setup: &'static str,
    pub summary: &'static str,
}

pub const CHAPTER_NOTES: &[ChapterNotes] = &[
    ChapterNotes {
        chapter_number: 1,
        character_changes: &["林逸获得修仙传承", "从普通人向修仙者转变"],
        next_chapter_setup: "林逸将开始正式修炼，为加入修仙门派做准备",
        summary: "第1章：林逸在山村发现修仙传承，获得《基础练气法》，决心踏上修仙之路。",
    },
    ChapterNotes {
        chapter_number: 2,
        character_changes: &["林逸开始正式修炼", "被青云门长老发现"],
        next_chapter_setup: "林逸将参加青云门的入门考核",
        summary: "第2章：林逸开始修炼，被青云门长老发现其极品五行灵根的天赋，获得入门考核机会。",
    },
];

/// 从生成结果推导出的结构化元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMetadata {
    pub key_plot_points: Vec<String>,
    pub character_changes: Vec<String>,
    pub next_chapter_setup: String,
    pub summary: String,
}

pub fn extract_plot_points(content: &str) -> Vec<String> {
    let points: Vec<String> = PLOT_TRIGGERS
        .iter()
        .filter(|(trigger, _)| content.contains(trigger))
        .map(|(_, point)| point.to_string())
        .collect();
    if points.is_empty() {
        vec![FALLBACK_PLOT_POINT.to_string()]
    } else {
        points
    }
}

fn notes_for(chapter: u32) -> Option<&'static ChapterNotes> {
    CHAPTER_NOTES.iter().find(|n| n.chapter_number == chapter)
}

pub fn derive_metadata(chapter: u32, content: &str) -> ChapterMetadata {
    let key_plot_points = extract_plot_points(content);
    match notes_for(chapter) {
        Some(notes) => ChapterMetadata {
            key_plot_points,
            character_changes: notes
                .character_changes
                .iter()
                .map(|s| s.to_string())
                .collect(),
            next_chapter_setup: notes.next_chapter_setup.to_string(),
            summary: notes.summary.to_string(),
        },
        None => ChapterMetadata {
            key_plot_points,
            character_changes: vec!["角色实力或认知的进一步发展".to_string()],
            next_chapter_setup: format!(
                "第{}章将继续推进主线剧情，角色面临新的挑战",
                chapter + 1
            ),
            summary: format!("第{chapter}章：主角修炼成长，剧情继续推进。"),
        },
    }
}

/// 字数：非空白字符数（中文按字计）
pub fn count_words(content: &str) -> u32 {
    content.chars().filter(|c| !c.is_whitespace()).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_points_follow_trigger_order() {
        let points = extract_plot_points("长老检测灵根后说：欢迎参加青云门的考核，踏上修仙路。");
        assert_eq!(points, vec!["修仙相关情节", "青云门相关", "天赋展现", "入门考核"]);
    }

    #[test]
    fn test_plot_points_fall_back_when_nothing_matches() {
        assert_eq!(extract_plot_points("晨光熹微。"), vec![FALLBACK_PLOT_POINT]);
        assert_eq!(extract_plot_points(""), vec![FALLBACK_PLOT_POINT]);
    }

    #[test]
    fn test_opening_chapters_use_notes_table() {
        let meta = derive_metadata(2, "灵根");
        assert_eq!(meta.next_chapter_setup, "林逸将参加青云门的入门考核");
        assert_eq!(meta.character_changes.len(), 2);
        assert!(meta.summary.starts_with("第2章"));
        assert_eq!(meta.key_plot_points, vec!["天赋展现"]);
    }

    #[test]
    fn test_later_chapters_use_generic_templates() {
        let meta = derive_metadata(7, "");
        assert_eq!(meta.next_chapter_setup, "第8章将继续推进主线剧情，角色面临新的挑战");
        assert_eq!(meta.summary, "第7章：主角修炼成长，剧情继续推进。");
        assert_eq!(meta.character_changes, vec!["角色实力或认知的进一步发展"]);
    }

    #[test]
    fn test_count_words_ignores_whitespace() {
        assert_eq!(count_words("　　青山如黛，\n白云悠悠。"), 10);
        assert_eq!(count_words("   "), 0);
    }
}
