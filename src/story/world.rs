//! 默认世界观与角色（初始化项目时的种子数据）

use std::collections::BTreeMap;

use crate::story::types::{Artifact, Character, Region, Relationship, Sect, WorldSetting};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sect(name: &str, alignment: &str, specialty: &str, location: &str, strength: &str) -> Sect {
    Sect {
        name: name.into(),
        alignment: alignment.into(),
        specialty: specialty.into(),
        location: location.into(),
        strength: strength.into(),
    }
}

fn region(name: &str, kind: &str, features: &[&str], dangers: &[&str], landmarks: &[&str]) -> Region {
    Region {
        name: name.into(),
        kind: kind.into(),
        features: strings(features),
        dangers: strings(dangers),
        landmarks: strings(landmarks),
    }
}

pub fn default_world() -> WorldSetting {
    let mut ability_system = BTreeMap::new();
    ability_system.insert("五行".to_string(), strings(&["金", "木", "水", "火", "土"]));
    ability_system.insert(
        "特殊道路".to_string(),
        strings(&["剑道", "丹道", "阵法", "符箓", "炼器", "驭兽", "音律"]),
    );
    ability_system.insert(
        "修炼资源".to_string(),
        strings(&["灵石", "丹药", "功法", "法宝"]),
    );

    WorldSetting {
        cultivation_levels: strings(&[
            "凡人", "练气初期", "练气中期", "练气后期", "练气大圆满",
            "筑基初期", "筑基中期", "筑基后期", "筑基大圆满",
            "金丹初期", "金丹中期", "金丹后期", "金丹大圆满",
            "元婴初期", "元婴中期", "元婴后期", "元婴大圆满",
            "化神期", "合体期", "大乘期", "渡劫期", "真仙",
        ]),
        sects: vec![
            sect("青云门", "正派", "剑修", "青云山脉", "超级势力"),
            sect("天音宗", "正派", "音律修炼", "天音谷", "一流势力"),
            sect("魔音寺", "邪派", "魔音攻击", "黑风谷", "一流势力"),
            sect("万药谷", "中立", "炼丹医道", "药王山", "超级势力"),
            sect("器宗", "中立", "炼器制宝", "炼器峰", "一流势力"),
        ],
        regions: vec![
            region(
                "东荒",
                "修仙圣地",
                &["灵气最浓郁", "宗门最多", "天才辈出"],
                &["妖兽王者", "上古秘境", "天劫频繁"],
                &["青云山", "万兽森林", "无极海"],
            ),
            region(
                "中州",
                "繁华地带",
                &["交通枢纽", "贸易中心"],
                &["势力复杂", "暗流涌动"],
                &["天音谷", "帝都", "拍卖行"],
            ),
            region(
                "西漠",
                "荒凉之地",
                &["环境恶劣", "邪修聚集"],
                &["魔修横行", "沙暴肆虐"],
                &["黑风谷", "血沙漠", "镇魔塔"],
            ),
            region(
                "南荒",
                "原始森林",
                &["古树参天", "灵药遍地"],
                &["毒虫猛兽", "瘴气弥漫"],
                &["药王山", "毒龙潭"],
            ),
            region(
                "北冥",
                "极地冰原",
                &["千年不化", "矿藏丰富"],
                &["极寒之力", "冰魄妖兽"],
                &["炼器峰", "冰宫", "玄冰洞"],
            ),
        ],
        ability_system,
        artifacts: vec![
            Artifact {
                name: "青锋剑".into(),
                grade: "上品法器".into(),
                description: "锋利无比的飞剑，可破金断石".into(),
            },
            Artifact {
                name: "炼心鼎".into(),
                grade: "极品宝器".into(),
                description: "炼丹神鼎，可提高丹药品质".into(),
            },
        ],
        background_story: "这是一个修仙者追求长生不老的世界。天地分为东荒、中州、西漠、南荒、北冥五大区域。\
千年前正邪大战，正道获胜，邪修退居西漠；近年魔道又有复苏迹象，大世将临。"
            .into(),
    }
}

/// 合并世界观修订：门派 / 地域 / 法宝按名字更新或追加，境界与法术条目只增不减，背景非空时替换
pub fn merge_world(base: &mut WorldSetting, amendment: WorldSetting) {
    for level in amendment.cultivation_levels {
        if !base.cultivation_levels.contains(&level) {
            base.cultivation_levels.push(level);
        }
    }
    upsert_by(&mut base.sects, amendment.sects, |s| s.name.clone());
    upsert_by(&mut base.regions, amendment.regions, |r| r.name.clone());
    upsert_by(&mut base.artifacts, amendment.artifacts, |a| a.name.clone());
    for (kind, items) in amendment.ability_system {
        let entry = base.ability_system.entry(kind).or_default();
        for item in items {
            if !entry.contains(&item) {
                entry.push(item);
            }
        }
    }
    if !amendment.background_story.trim().is_empty() {
        base.background_story = amendment.background_story;
    }
}

fn upsert_by<T, K: PartialEq>(base: &mut Vec<T>, incoming: Vec<T>, key: impl Fn(&T) -> K) {
    for item in incoming {
        let k = key(&item);
        match base.iter_mut().find(|existing| key(&**existing) == k) {
            Some(existing) => *existing = item,
            None => base.push(item),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn character(
    name: &str,
    age: u32,
    gender: &str,
    level: &str,
    personality: &str,
    background: &str,
    relation: Option<&str>,
    abilities: &[&str],
    goals: &str,
    role: &str,
) -> Character {
    Character {
        name: name.into(),
        age,
        gender: gender.into(),
        cultivation_level: level.into(),
        personality: personality.into(),
        background: background.into(),
        relationships: relation
            .map(|r| {
                vec![Relationship {
                    relation: r.into(),
                    target: "林逸".into(),
                }]
            })
            .unwrap_or_default(),
        abilities: strings(abilities),
        goals: goals.into(),
        role: role.into(),
    }
}

pub fn default_cast() -> Vec<Character> {
    vec![
        character(
            "林逸", 18, "男", "凡人",
            "坚韧不拔，重情重义，天赋异禀，心思敏捷",
            "出身贫寒山村，父母早亡，意外获得修仙传承",
            None,
            &["极品五行灵根", "过目不忘", "天生剑心"],
            "成为绝世强者，保护重要的人，探索修仙大道",
            "主角",
        ),
        character(
            "玄机真人", 800, "男", "化神后期",
            "睿智深沉，亦师亦友，神秘莫测",
            "青云门太上长老，隐世高人，主角的引路人",
            Some("师父"),
            &["阵法大师", "丹道宗师", "剑道通神"],
            "培养优秀弟子，守护青云门",
            "导师",
        ),
        character(
            "苏婉儿", 17, "女", "练气期",
            "温柔善良，聪慧坚强",
            "同村少女，与主角青梅竹马，也有修仙天赋",
            Some("青梅竹马"),
            &["上品水灵根", "医术精通"],
            "跟随林逸修仙，成为他的助力",
            "女主角",
        ),
        character(
            "张浩然", 25, "男", "筑基中期",
            "豪爽正直，义薄云天，护短",
            "青云门内门弟子，主角的师兄",
            Some("师兄"),
            &["上品金灵根", "剑法精湛"],
            "保护师弟，振兴青云门",
            "师兄",
        ),
        character(
            "李冥", 30, "男", "筑基后期",
            "阴险狡诈，嫉妒心重",
            "青云门内门弟子，因嫉妒主角天赋而生恨",
            Some("敌对师兄"),
            &["中品火灵根", "阴毒功法"],
            "除掉林逸，获得更多资源",
            "早期反派",
        ),
        character(
            "血魔老祖", 2000, "男", "大乘中期",
            "嗜血残忍，野心勃勃，城府极深",
            "魔道巨擘，千年前正邪大战的幸存者",
            Some("宿敌"),
            &["血道魔功", "不死之身"],
            "魔道复兴，统治修仙界",
            "最终反派",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cast_relationships_point_at_protagonist() {
        let cast = default_cast();
        assert_eq!(cast[0].role, "主角");
        assert!(cast[0].relationships.is_empty());
        assert!(cast[1..]
            .iter()
            .all(|c| c.relationships.iter().all(|r| r.target == cast[0].name)));
    }

    #[test]
    fn test_merge_world_never_removes() {
        let mut world = default_world();
        let before_sects = world.sects.len();
        let mut amendment = WorldSetting::default();
        amendment.sects.push(sect("青云门", "正派", "剑修", "青云山脉", "圣地"));
        amendment.sects.push(sect("合欢宗", "邪派", "双修", "南疆", "二流势力"));
        amendment.ability_system.insert("五行".into(), strings(&["金", "雷"]));
        merge_world(&mut world, amendment);

        assert_eq!(world.sects.len(), before_sects + 1);
        assert_eq!(world.sects[0].strength, "圣地");
        assert_eq!(world.ability_system["五行"].len(), 6);
        assert_eq!(world.cultivation_levels.len(), default_world().cultivation_levels.len());
        assert!(!world.background_story.is_empty());
    }

    #[test]
    fn test_default_world_is_populated() {
        let world = default_world();
        assert_eq!(world.cultivation_levels.first().map(String::as_str), Some("凡人"));
        assert_eq!(world.cultivation_levels.last().map(String::as_str), Some("真仙"));
        assert_eq!(world.sects.len(), 5);
        assert!(world.ability_system.contains_key("五行"));
    }
}
