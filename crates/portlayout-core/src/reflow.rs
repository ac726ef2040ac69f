//! Column reflow: changing the number of columns in a tab.
//!
//! Growing appends empty columns after the last existing one. Shrinking
//! moves the portlets of every excess column, leftmost first and in their
//! existing order, to the end of the last retained column, then deletes the
//! emptied columns. Afterwards each column gets its `width` preference.

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::NodeDraft;
use crate::permission::{self, Capability};
use crate::preferences::StructurePreferences;
use crate::tree::LayoutTree;

/// What a reflow changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflowOutcome {
    /// Columns created to reach the desired count, in order.
    pub new_columns: Vec<NodeId>,
    /// Excess columns that were deleted.
    pub removed_columns: Vec<NodeId>,
    /// Portlets relocated out of removed columns, in relocation order.
    pub moved_portlets: Vec<NodeId>,
}

/// Resizes `tab` to `desired_count` columns and applies `widths`.
///
/// Either everything is applied or nothing is: all checks run up front and
/// the structural work happens on a scratch copy that replaces `tree` only
/// on success.
pub fn change_column_count(
    tree: &mut LayoutTree,
    prefs: &mut StructurePreferences,
    tab: &NodeId,
    desired_count: usize,
    widths: &[String],
) -> Result<ReflowOutcome, CoreError> {
    if desired_count == 0 {
        return Err(CoreError::invalid("a tab needs at least one column"));
    }
    if widths.len() != desired_count {
        return Err(CoreError::invalid(format!(
            "{} width(s) given for {} column(s)",
            widths.len(),
            desired_count
        )));
    }
    let widths = widths
        .iter()
        .map(|w| normalize_width(w))
        .collect::<Result<Vec<_>, _>>()?;

    let existing = tree.columns(tab)?.to_vec();
    check_permissions(tree, tab, &existing, desired_count)?;

    let mut work = tree.clone();
    let mut outcome = ReflowOutcome::default();

    if desired_count > existing.len() {
        for _ in existing.len()..desired_count {
            let id = work.add_node(NodeDraft::column(), tab, None)?;
            outcome.new_columns.push(id);
        }
    } else if desired_count < existing.len() {
        let retained = &existing[desired_count - 1];
        for excess in &existing[desired_count..] {
            let portlets = work.get_child_ids(excess)?.to_vec();
            for portlet in portlets {
                work.move_node(&portlet, retained, None)?;
                outcome.moved_portlets.push(portlet);
            }
            work.delete_node(excess)?;
            outcome.removed_columns.push(excess.clone());
        }
    }

    let columns = work.columns(tab)?.to_vec();
    *tree = work;

    for removed in &outcome.removed_columns {
        prefs.remove_node(removed);
    }
    for (column, width) in columns.iter().zip(widths) {
        prefs.set_width(column, width);
    }
    Ok(outcome)
}

fn check_permissions(
    tree: &LayoutTree,
    tab: &NodeId,
    existing: &[NodeId],
    desired_count: usize,
) -> Result<(), CoreError> {
    if desired_count > existing.len() {
        return permission::require(tree.get_node(tab)?, Capability::AddChild);
    }
    if desired_count == existing.len() {
        return Ok(());
    }

    let excess = &existing[desired_count..];
    let mut moving = false;
    for column in excess {
        permission::require(tree.get_node(column)?, Capability::Delete)?;
        for portlet in tree.get_child_ids(column)? {
            permission::require(tree.get_node(portlet)?, Capability::Move)?;
            moving = true;
        }
    }
    if moving {
        let retained = tree.get_node(&existing[desired_count - 1])?;
        permission::require(retained, Capability::Edit)?;
        permission::require(retained, Capability::AddChild)?;
    }
    Ok(())
}

/// Accepts `50`, `50%`, `33.3` or `33.3%`; returns the `%` form.
pub fn normalize_width(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let mut dots = 0;
    let mut digits = 0;
    for c in number.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => {
                digits = 0;
                break;
            }
        }
    }
    if digits == 0 || dots > 1 {
        return Err(CoreError::invalid(format!("invalid column width '{raw}'")));
    }
    Ok(format!("{number}%"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ContentId;
    use crate::node::{NodeChanges, PortletRef};

    fn widths(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|w| w.to_string()).collect()
    }

    fn portlet(title: &str) -> NodeDraft {
        NodeDraft::portlet(
            title,
            PortletRef {
                content_id: ContentId(9),
                fname: title.to_lowercase(),
            },
        )
    }

    /// tab -> [C1=[P1,P2], C2=[P3]]
    fn two_columns() -> (LayoutTree, NodeId, Vec<NodeId>, Vec<NodeId>) {
        let mut tree = LayoutTree::new("Layout");
        let root = tree.root_id().clone();
        let tab = tree.add_node(NodeDraft::tab("Home"), &root, None).unwrap();
        let c1 = tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        let c2 = tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        let p1 = tree.add_node(portlet("P1"), &c1, None).unwrap();
        let p2 = tree.add_node(portlet("P2"), &c1, None).unwrap();
        let p3 = tree.add_node(portlet("P3"), &c2, None).unwrap();
        (tree, tab, vec![c1, c2], vec![p1, p2, p3])
    }

    #[test]
    fn shrink_moves_portlets_to_last_retained_column() {
        let (mut tree, tab, cols, ps) = two_columns();
        let mut prefs = StructurePreferences::new();
        prefs.set_width(&cols[1], "50%");

        let outcome =
            change_column_count(&mut tree, &mut prefs, &tab, 1, &widths(&["100%"])).unwrap();

        assert_eq!(tree.columns(&tab).unwrap(), &[cols[0].clone()]);
        assert_eq!(tree.get_child_ids(&cols[0]).unwrap(), ps.as_slice());
        assert!(!tree.contains(&cols[1]));
        assert_eq!(outcome.removed_columns, vec![cols[1].clone()]);
        assert_eq!(outcome.moved_portlets, vec![ps[2].clone()]);
        assert_eq!(prefs.width(&cols[0]), Some("100%"));
        assert_eq!(prefs.width(&cols[1]), None);
        tree.validate().unwrap();
    }

    #[test]
    fn shrink_takes_excess_columns_left_to_right() {
        let (mut tree, tab, cols, ps) = two_columns();
        let c3 = tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        let p4 = tree.add_node(portlet("P4"), &c3, None).unwrap();
        let mut prefs = StructurePreferences::new();

        change_column_count(&mut tree, &mut prefs, &tab, 1, &widths(&["100"])).unwrap();

        let mut expected = ps.clone();
        expected.push(p4);
        assert_eq!(tree.get_child_ids(&cols[0]).unwrap(), expected.as_slice());
        assert_eq!(prefs.width(&cols[0]), Some("100%"));
    }

    #[test]
    fn growth_appends_empty_columns() {
        let mut tree = LayoutTree::new("Layout");
        let root = tree.root_id().clone();
        let tab = tree.add_node(NodeDraft::tab("Home"), &root, None).unwrap();
        let c1 = tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        let p1 = tree.add_node(portlet("P1"), &c1, None).unwrap();
        let mut prefs = StructurePreferences::new();

        let outcome = change_column_count(
            &mut tree,
            &mut prefs,
            &tab,
            3,
            &widths(&["34%", "33%", "33%"]),
        )
        .unwrap();

        let columns = tree.columns(&tab).unwrap().to_vec();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0], c1);
        assert_eq!(&columns[1..], outcome.new_columns.as_slice());
        assert_eq!(tree.get_child_ids(&c1).unwrap(), &[p1]);
        assert!(tree.get_child_ids(&columns[1]).unwrap().is_empty());
        assert!(tree.get_child_ids(&columns[2]).unwrap().is_empty());
        assert_eq!(prefs.width(&columns[2]), Some("33%"));
    }

    #[test]
    fn same_count_only_updates_widths() {
        let (mut tree, tab, cols, _) = two_columns();
        let before = tree.clone();
        let mut prefs = StructurePreferences::new();
        let outcome =
            change_column_count(&mut tree, &mut prefs, &tab, 2, &widths(&["30", "70"])).unwrap();
        assert_eq!(outcome, ReflowOutcome::default());
        assert_eq!(tree, before);
        assert_eq!(prefs.width(&cols[1]), Some("70%"));
    }

    #[test]
    fn rejects_bad_requests_without_changes() {
        let (mut tree, tab, cols, _) = two_columns();
        let before = tree.clone();
        let mut prefs = StructurePreferences::new();

        for (count, ws) in [
            (0, widths(&[])),
            (2, widths(&["100%"])),
            (1, widths(&["wide"])),
            (1, widths(&["-5%"])),
            (1, widths(&["1.2.3"])),
        ] {
            let err = change_column_count(&mut tree, &mut prefs, &tab, count, &ws).unwrap_err();
            assert!(matches!(err, CoreError::InvalidRequest { .. }), "{err}");
        }
        let err = change_column_count(&mut tree, &mut prefs, &cols[0], 1, &widths(&["1"]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));

        assert_eq!(tree, before);
        assert!(prefs.is_empty());
    }

    #[test]
    fn immovable_portlet_blocks_shrink() {
        let (mut tree, tab, _, ps) = two_columns();
        tree.update_node(
            &ps[2],
            &NodeChanges {
                movable: Some(false),
                ..NodeChanges::default()
            },
        )
        .unwrap();
        let before = tree.clone();
        let mut prefs = StructurePreferences::new();

        let err = change_column_count(&mut tree, &mut prefs, &tab, 1, &widths(&["100%"]))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PermissionDenied {
                capability: Capability::Move,
                ..
            }
        ));
        assert_eq!(tree, before);
        assert!(prefs.is_empty());
    }

    #[test]
    fn locked_tab_blocks_growth() {
        let (mut tree, tab, _, _) = two_columns();
        tree.update_node(
            &tab,
            &NodeChanges {
                add_child_allowed: Some(false),
                ..NodeChanges::default()
            },
        )
        .unwrap();
        let mut prefs = StructurePreferences::new();
        let err = change_column_count(&mut tree, &mut prefs, &tab, 3, &widths(&["1", "1", "1"]))
            .unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));
        assert_eq!(tree.columns(&tab).unwrap().len(), 2);
    }

    #[test]
    fn width_forms() {
        assert_eq!(normalize_width("50").unwrap(), "50%");
        assert_eq!(normalize_width(" 33.3% ").unwrap(), "33.3%");
        assert!(normalize_width("%").is_err());
        assert!(normalize_width("50px").is_err());
        assert!(normalize_width("").is_err());
    }
}
