/// Resolve the sub-profession implied by a skill, if the skill is specific to one.
pub fn sub_profession_for_skill(skill_id: u32) -> Option<&'static str> {
    let label = match skill_id {
        1241 => "Frostbeam",
        2307 | 2361 | 55302 => "Concerto",
        20301 => "Lifebind",
        1518 | 1541 | 21402 => "Smite",
        2306 => "Dissonance",
        120901 | 120902 => "Icicle",
        1714 | 1734 => "Iaido Slash",
        44701 | 179906 => "MoonStrike",
        220112 | 2203622 => "Falconry",
        2292 | 1700820 | 1700825 | 1700827 => "Wildpack",
        1419 => "Empty Gun",
        1405 | 1418 => "Heavy Armor",
        2405 => "Vanguard",
        2406 => "Shield",
        199902 => "Skyward",
        1930 | 1931 | 1934 | 1935 => "Block",
        _ => return None,
    };
    Some(label)
}
