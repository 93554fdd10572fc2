//! The `<Include>`/`<Exclude>` matching-rule engine.
//!
//! Rules are parsed once per menu and evaluated against every pooled desktop
//! entry. The boolean connectives follow the menu specification: `<Or>` and
//! the rule lists directly below `<Include>`/`<Exclude>` match if any child
//! matches, `<And>` if all children match, and `<Not>` if no child matches.
//! An `<And>` with no children matches nothing; this is asymmetric with
//! `<Not>` (which then matches everything) but it is the documented contract.

use tracing::warn;

use crate::desktop_file::DesktopFile;
use crate::xml::Element;

#[derive(Debug)]
enum Rule {
    Or(Vec<Rule>),
    And(Vec<Rule>),
    Not(Vec<Rule>),
    Filename(String),
    Category(String),
    All,
}

impl Rule {
    fn parse_children(element: &Element) -> Vec<Rule> {
        let mut rules = Vec::new();
        for child in element.children() {
            match child.tag() {
                "Or" => rules.push(Rule::Or(Rule::parse_children(child))),
                "And" => rules.push(Rule::And(Rule::parse_children(child))),
                "Not" => rules.push(Rule::Not(Rule::parse_children(child))),
                "Filename" => rules.push(Rule::Filename(child.text().to_owned())),
                "Category" => rules.push(Rule::Category(child.text().to_owned())),
                "All" => rules.push(Rule::All),
                other => warn!(rule = other, "ignoring unknown matching rule"),
            }
        }
        rules
    }

    fn matches(&self, id: &str, file: &DesktopFile) -> bool {
        match self {
            Rule::Or(children) => children.iter().any(|rule| rule.matches(id, file)),
            Rule::And(children) => {
                !children.is_empty() && children.iter().all(|rule| rule.matches(id, file))
            }
            Rule::Not(children) => !children.iter().any(|rule| rule.matches(id, file)),
            Rule::Filename(wanted) => id == wanted,
            Rule::Category(wanted) => file.categories().iter().any(|c| c == wanted),
            Rule::All => true,
        }
    }
}

/// The include and exclude rules of one menu.
#[derive(Debug, Default)]
pub(crate) struct RuleSet {
    includes: Vec<Rule>,
    excludes: Vec<Rule>,
}

impl RuleSet {
    /// Parses an `<Include>` element's children as one top-level rule.
    pub(crate) fn add_include(&mut self, element: &Element) {
        self.includes.push(Rule::Or(Rule::parse_children(element)));
    }

    /// Parses an `<Exclude>` element's children as one top-level rule.
    pub(crate) fn add_exclude(&mut self, element: &Element) {
        self.excludes.push(Rule::Or(Rule::parse_children(element)));
    }

    /// Whether any include rule matches the entry.
    pub(crate) fn check_include(&self, id: &str, file: &DesktopFile) -> bool {
        self.includes.iter().any(|rule| rule.matches(id, file))
    }

    /// Whether any exclude rule matches the entry.
    pub(crate) fn check_exclude(&self, id: &str, file: &DesktopFile) -> bool {
        self.excludes.iter().any(|rule| rule.matches(id, file))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn game_entry() -> DesktopFile {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("chess.desktop");
        fs::write(
            &path,
            "[Desktop Entry]\nType=Application\nName=Chess\nExec=chess\nCategories=Game;BoardGame;\n",
        )
        .unwrap();
        DesktopFile::load(&path).unwrap()
    }

    fn rule_set(include: &str) -> RuleSet {
        let element = Element::parse(include).unwrap();
        let mut rules = RuleSet::default();
        rules.add_include(&element);
        rules
    }

    #[test]
    fn category_and_filename_match() {
        let file = game_entry();
        let rules = rule_set("<Include><Category>Game</Category></Include>");
        assert!(rules.check_include("chess.desktop", &file));

        let rules = rule_set("<Include><Filename>chess.desktop</Filename></Include>");
        assert!(rules.check_include("chess.desktop", &file));
        assert!(!rules.check_include("other.desktop", &file));
    }

    #[test]
    fn vacuous_connectives() {
        let file = game_entry();

        // An empty <And> matches nothing, an empty <Or> matches nothing.
        let rules = rule_set("<Include><And/></Include>");
        assert!(!rules.check_include("chess.desktop", &file));
        let rules = rule_set("<Include><Or/></Include>");
        assert!(!rules.check_include("chess.desktop", &file));

        // <Not><All/></Not> matches nothing, an empty <Not> everything.
        let rules = rule_set("<Include><Not><All/></Not></Include>");
        assert!(!rules.check_include("chess.desktop", &file));
        let rules = rule_set("<Include><Not/></Include>");
        assert!(rules.check_include("chess.desktop", &file));
    }

    #[test]
    fn nested_connectives() {
        let file = game_entry();
        let rules = rule_set(
            "<Include><And><Category>Game</Category><Not><Category>ArcadeGame</Category></Not></And></Include>",
        );
        assert!(rules.check_include("chess.desktop", &file));

        let rules = rule_set(
            "<Include><And><Category>Game</Category><Category>ArcadeGame</Category></And></Include>",
        );
        assert!(!rules.check_include("chess.desktop", &file));
    }

    #[test]
    fn unknown_rules_are_ignored() {
        let file = game_entry();
        let rules = rule_set("<Include><Nonsense/><Category>Game</Category></Include>");
        assert!(rules.check_include("chess.desktop", &file));
    }

    #[test]
    fn excludes_are_checked_separately() {
        let file = game_entry();
        let element = Element::parse("<Exclude><Filename>chess.desktop</Filename></Exclude>").unwrap();
        let mut rules = rule_set("<Include><All/></Include>");
        rules.add_exclude(&element);
        assert!(rules.check_include("chess.desktop", &file));
        assert!(rules.check_exclude("chess.desktop", &file));
        assert!(!rules.check_exclude("other.desktop", &file));
    }
}
