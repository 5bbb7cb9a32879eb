use std::fmt::Write;

use crate::defs::EntityDef;

/// One `{ ... }` block. `classname` always comes first, the remaining
/// properties follow in key order.
pub fn serialize_entity(entity: &EntityDef) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    let _ = writeln!(out, "\"classname\" \"{}\"", entity.classname);
    for (key, value) in &entity.properties {
        if key == "classname" {
            continue;
        }
        let _ = writeln!(out, "\"{}\" \"{}\"", key, value);
    }
    out.push_str("}\n");
    out
}

pub fn serialize_entities(entities: &[EntityDef]) -> String {
    entities.iter().map(serialize_entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_block_layout() {
        let e = EntityDef::new("info_player_start")
            .with_property("origin", "0 0 24")
            .with_property("angle", "90");
        assert_eq!(
            serialize_entity(&e),
            "{\n\"classname\" \"info_player_start\"\n\"angle\" \"90\"\n\"origin\" \"0 0 24\"\n}\n"
        );
    }

    #[test]
    fn duplicate_classname_is_skipped() {
        let e = EntityDef::new("worldspawn").with_property("classname", "light");
        let raw = serialize_entities(&[e, EntityDef::new("light")]);
        assert_eq!(raw.matches("worldspawn").count(), 1);
        assert_eq!(raw.matches("\"classname\"").count(), 2);
        assert!(raw.ends_with("\"classname\" \"light\"\n}\n"));
    }
}
