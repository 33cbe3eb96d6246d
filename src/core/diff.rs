//! diff 引擎：对比左右扫描树，产出事务树

use crate::config::SyncOptions;
use crate::core::errors::DiffError;
use crate::core::scanner::{DirEntity, ScanDirStats, ScanEntry};
use crate::core::transaction::{SyncCfg, SyncStatus, TransactionId, TransactionNode};
use crate::core::tree::TransactionTree;
use crate::storage::EntryHandle;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 对比左右根目录，构建事务树
///
/// 根事务是两个根目录合成的 EQUAL 目录对，右根句柄作为其子事务的右侧父句柄
pub fn diff(
    left_root: Arc<DirEntity>,
    right_root: Arc<DirEntity>,
    options: &SyncOptions,
) -> Result<TransactionTree, DiffError> {
    let mut builder = TreeBuilder {
        is_case_sensitive: options.is_case_sensitive,
        nodes: HashMap::new(),
        dependency_of: HashMap::new(),
        dependants_of: HashMap::new(),
    };

    let root_handle = right_root.handle.clone();
    let root_id = builder.build_dir(
        SyncCfg::EqualDir {
            left: left_root,
            right: right_root,
        },
        None,
        Some(root_handle),
    )?;

    let tree = TransactionTree {
        nodes: builder.nodes,
        root: root_id,
        dependency_of: builder.dependency_of,
        dependants_of: builder.dependants_of,
    };
    debug!("diff 完成: 共 {} 个事务", tree.len());
    Ok(tree)
}

struct TreeBuilder {
    is_case_sensitive: bool,
    nodes: HashMap<TransactionId, TransactionNode>,
    dependency_of: HashMap<TransactionId, TransactionId>,
    dependants_of: HashMap<TransactionId, Vec<TransactionId>>,
}

impl TreeBuilder {
    fn normalize(&self, name: &str) -> String {
        if self.is_case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    fn copy_left_cfg(entry: &ScanEntry) -> SyncCfg {
        match entry {
            ScanEntry::File(f) => SyncCfg::CopyLeftFile { left: f.clone() },
            ScanEntry::Dir(d) => SyncCfg::CopyLeftDir { left: d.clone() },
        }
    }

    fn delete_right_cfg(entry: &ScanEntry) -> SyncCfg {
        match entry {
            ScanEntry::File(f) => SyncCfg::DeleteRightFile { right: f.clone() },
            ScanEntry::Dir(d) => SyncCfg::DeleteRightDir { right: d.clone() },
        }
    }

    fn build_entry(
        &mut self,
        cfg: SyncCfg,
        parent: TransactionId,
        right_parent: Option<EntryHandle>,
    ) -> Result<TransactionId, DiffError> {
        if cfg.kind().is_file() {
            Ok(self.build_file(cfg, parent, right_parent))
        } else {
            self.build_dir(cfg, Some(parent), right_parent)
        }
    }

    fn build_file(
        &mut self,
        cfg: SyncCfg,
        parent: TransactionId,
        right_parent: Option<EntryHandle>,
    ) -> TransactionId {
        let id = Uuid::new_v4();
        let mut node = TransactionNode::new(id, cfg, Some(parent), right_parent);
        node.finalize_aggr();
        self.nodes.insert(id, node);
        id
    }

    /// 构建目录事务：先递归构建子事务（统计依赖子级先行存在），再装配自身
    fn build_dir(
        &mut self,
        cfg: SyncCfg,
        parent: Option<TransactionId>,
        right_parent: Option<EntryHandle>,
    ) -> Result<TransactionId, DiffError> {
        let id = Uuid::new_v4();

        let (left_side, right_side) = match &cfg {
            SyncCfg::EqualDir { left, right } => (Some(left.clone()), Some(right.clone())),
            SyncCfg::CopyLeftDir { left } => (Some(left.clone()), None),
            SyncCfg::DeleteRightDir { right } => (None, Some(right.clone())),
            _ => unreachable!(),
        };
        // COPYLEFT 目录的目标尚不存在，其子事务的右侧父句柄待创建后绑定
        let right_handle_for_children = right_side.as_ref().map(|r| r.handle.clone());

        let child_ids =
            self.diff_children(id, left_side.as_deref(), right_side.as_deref(), right_handle_for_children)?;

        let mut node = TransactionNode::new(id, cfg, parent, right_parent);
        let mut diff_stats = crate::core::transaction::DiffStats::default();
        let mut children_to_sync = HashMap::new();

        for &child_id in &child_ids {
            let Some(child) = self.nodes.get(&child_id) else {
                continue;
            };
            let child_action = child.action();
            if child.requires_sync() {
                children_to_sync.insert(child_id, SyncStatus::Init);
            }

            if child.kind().is_file() {
                let slot = diff_stats.by_action_mut(child_action);
                slot.files_count += 1;
                match child.cfg() {
                    SyncCfg::EqualFile { left, right } | SyncCfg::Overwrite { left, right } => {
                        slot.size_left += left.size;
                        slot.size_right += right.size;
                    }
                    SyncCfg::CopyLeftFile { left } => slot.size_left += left.size,
                    SyncCfg::DeleteRightFile { right } => slot.size_right += right.size,
                    _ => {}
                }
            } else {
                diff_stats.by_action_mut(child_action).dirs_count += 1;
                diff_stats.merge(child.diff_stats());
            }
        }

        node.children = child_ids;
        node.children_to_sync = children_to_sync;
        node.diff_stats = diff_stats;

        self.validate_stats(&node)?;
        node.finalize_aggr();
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn diff_children(
        &mut self,
        parent: TransactionId,
        left: Option<&DirEntity>,
        right: Option<&DirEntity>,
        right_parent: Option<EntryHandle>,
    ) -> Result<Vec<TransactionId>, DiffError> {
        let mut ids = Vec::new();

        match (left, right) {
            (Some(left), None) => {
                for entry in &left.children {
                    ids.push(self.build_entry(
                        Self::copy_left_cfg(entry),
                        parent,
                        right_parent.clone(),
                    )?);
                }
            }
            (None, Some(right)) => {
                for entry in &right.children {
                    ids.push(self.build_entry(
                        Self::delete_right_cfg(entry),
                        parent,
                        right_parent.clone(),
                    )?);
                }
            }
            (Some(left), Some(right)) => {
                // 右侧归一化名称索引
                let mut right_index: HashMap<String, &ScanEntry> = HashMap::new();
                for entry in &right.children {
                    right_index.insert(self.normalize(entry.name()), entry);
                }
                if right_index.len() != right.children.len() {
                    warn!(
                        "目录 '{}' 归一化后名称数量不符，请检查大小写敏感设置",
                        right.name
                    );
                }

                let mut matched: HashSet<String> = HashSet::new();

                for left_entry in &left.children {
                    let key = self.normalize(left_entry.name());
                    let right_match = right_index.get(&key).copied();
                    if right_match.is_some() {
                        matched.insert(key);
                    }

                    match (left_entry, right_match) {
                        // 目录相等是结构性的：无条件下钻对比子级
                        (ScanEntry::Dir(ld), Some(ScanEntry::Dir(rd))) => {
                            ids.push(self.build_dir(
                                SyncCfg::EqualDir {
                                    left: ld.clone(),
                                    right: rd.clone(),
                                },
                                Some(parent),
                                right_parent.clone(),
                            )?);
                        }
                        (ScanEntry::File(lf), Some(ScanEntry::File(rf))) => {
                            // 大小一致且右侧不早于左侧即视为相等
                            if lf.size == rf.size && rf.mtime >= lf.mtime {
                                ids.push(self.build_file(
                                    SyncCfg::EqualFile {
                                        left: lf.clone(),
                                        right: rf.clone(),
                                    },
                                    parent,
                                    right_parent.clone(),
                                ));
                            } else {
                                ids.push(self.build_file(
                                    SyncCfg::Overwrite {
                                        left: lf.clone(),
                                        right: rf.clone(),
                                    },
                                    parent,
                                    right_parent.clone(),
                                ));
                            }
                        }
                        // 右侧无匹配，或同名但类型不同
                        (entry, conflict) => {
                            let dependant_id = self.build_entry(
                                Self::copy_left_cfg(entry),
                                parent,
                                right_parent.clone(),
                            )?;
                            ids.push(dependant_id);

                            if let Some(conflicting) = conflict {
                                // 目标名被不兼容类型占用：先删除右侧，再创建左侧
                                let dependency_id = self.build_entry(
                                    Self::delete_right_cfg(conflicting),
                                    parent,
                                    right_parent.clone(),
                                )?;
                                ids.push(dependency_id);
                                self.dependency_of.insert(dependant_id, dependency_id);
                                self.dependants_of
                                    .entry(dependency_id)
                                    .or_default()
                                    .push(dependant_id);
                                debug!(
                                    "类型冲突: '{}' 需等待右侧同名条目删除",
                                    entry.name()
                                );
                            }
                        }
                    }
                }

                // 步骤 3 未匹配到的右侧条目全部删除
                for right_entry in &right.children {
                    if matched.contains(&self.normalize(right_entry.name())) {
                        continue;
                    }
                    ids.push(self.build_entry(
                        Self::delete_right_cfg(right_entry),
                        parent,
                        right_parent.clone(),
                    )?);
                }
            }
            (None, None) => {}
        }

        Ok(ids)
    }

    /// 对账检查：COPY+EQUAL 对左侧扫描统计，DELETE+EQUAL 对右侧扫描统计
    fn validate_stats(&self, node: &TransactionNode) -> Result<(), DiffError> {
        let totals = node.diff_stats().totals();

        let zero = ScanDirStats::default();
        let (left_stats, right_stats) = match node.cfg() {
            SyncCfg::EqualDir { left, right } => (left.stats, right.stats),
            SyncCfg::CopyLeftDir { left } => (left.stats, zero),
            SyncCfg::DeleteRightDir { right } => (zero, right.stats),
            _ => return Ok(()),
        };

        let checks = [
            (
                "size(copy+equal) vs left scan",
                totals.copy.size + totals.equal.size,
                left_stats.size,
            ),
            (
                "files(copy+equal) vs left scan",
                totals.copy.files_count + totals.equal.files_count,
                left_stats.files_count,
            ),
            (
                "dirs(copy+equal) vs left scan",
                totals.copy.dirs_count + totals.equal.dirs_count,
                left_stats.dirs_count,
            ),
            (
                "size(delete+equal) vs right scan",
                totals.delete.size + totals.equal.size,
                right_stats.size,
            ),
            (
                "files(delete+equal) vs right scan",
                totals.delete.files_count + totals.equal.files_count,
                right_stats.files_count,
            ),
            (
                "dirs(delete+equal) vs right scan",
                totals.delete.dirs_count + totals.equal.dirs_count,
                right_stats.dirs_count,
            ),
        ];

        for (label, actual, expected) in checks {
            if actual != expected {
                error!(
                    "diff 统计对账失败: '{}' {} actual={} expected={}",
                    node.name(),
                    label,
                    actual,
                    expected
                );
                return Err(DiffError::Inconsistent {
                    name: node.name().to_string(),
                    detail: format!("{label}: actual={actual}, expected={expected}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::test_support::{make_dir, Node};
    use crate::core::transaction::SyncAction;
    use crate::storage::EntryKind;

    fn options(is_case_sensitive: bool) -> SyncOptions {
        SyncOptions {
            is_case_sensitive,
            ..SyncOptions::default()
        }
    }

    /// 期望树节点：文件为（名称, 动作），目录为（名称, 动作, 子级）
    enum Expect {
        F(&'static str, SyncAction),
        D(&'static str, SyncAction, Vec<Expect>),
    }

    fn assert_children(tree: &TransactionTree, parent: TransactionId, expected: &[Expect]) {
        let children = tree.children_of(parent);
        assert_eq!(
            children.len(),
            expected.len(),
            "children count mismatch under {:?}",
            tree.node(parent).map(|n| n.name().to_string())
        );

        for expect in expected {
            let (name, kind, action, nested) = match expect {
                Expect::F(name, action) => (*name, EntryKind::File, *action, None),
                Expect::D(name, action, nested) => {
                    (*name, EntryKind::Dir, *action, Some(nested))
                }
            };
            let child = children
                .iter()
                .filter_map(|id| tree.node(*id))
                .find(|n| n.name() == name && n.kind() == kind)
                .unwrap_or_else(|| panic!("missing child '{name}' ({kind:?})"));
            assert_eq!(
                child.action(),
                action,
                "action mismatch for '{name}'"
            );
            if let Some(nested) = nested {
                assert_children(tree, child.id(), nested);
            }
        }
    }

    fn find(tree: &TransactionTree, name: &str, action: SyncAction) -> TransactionId {
        tree.nodes()
            .find(|n| n.name() == name && n.action() == action)
            .map(|n| n.id())
            .unwrap_or_else(|| panic!("transaction '{name}' ({action:?}) not found"))
    }

    #[test]
    fn test_identical_trees_are_all_equal() {
        // 右侧 mtime 均不早于左侧：全部 EQUAL，无可调度事务
        let left = make_dir(
            "left",
            vec![
                Node::F("a", 10, 2),
                Node::D(
                    "dir1",
                    vec![
                        Node::F("a", 100, 2),
                        Node::D("dir11", vec![Node::F("a", 100, 2)]),
                        Node::F("c", 100, 2),
                    ],
                ),
            ],
        );
        let right = make_dir(
            "right",
            vec![
                Node::F("A", 10, 4),
                Node::D(
                    "DIR1",
                    vec![
                        Node::F("a", 100, 4),
                        Node::D("dir11", vec![Node::F("a", 100, 4)]),
                        Node::F("c", 100, 4),
                    ],
                ),
            ],
        );

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("a", SyncAction::Equal),
                Expect::D(
                    "dir1",
                    SyncAction::Equal,
                    vec![
                        Expect::F("a", SyncAction::Equal),
                        Expect::F("c", SyncAction::Equal),
                        Expect::D("dir11", SyncAction::Equal, vec![Expect::F("a", SyncAction::Equal)]),
                    ],
                ),
            ],
        );

        assert!(!tree.needs_sync(tree.root_id()));
        let totals = tree.root_totals();
        assert_eq!(totals.copy.files_count, 0);
        assert_eq!(totals.delete.files_count, 0);
        assert_eq!(totals.equal.files_count, 4);
        assert_eq!(totals.equal.size, 310);
    }

    #[test]
    fn test_copy_left_with_case_insensitive_dir_match() {
        let left = make_dir(
            "left",
            vec![
                Node::F("a", 10, 2),
                Node::F("b", 10, 2),
                Node::D(
                    "dir1",
                    vec![
                        Node::F("a", 100, 2),
                        Node::F("C", 100, 2),
                        Node::D(
                            "dir11",
                            vec![Node::F("a", 100, 2), Node::D("emptyDir111", vec![])],
                        ),
                        Node::D("emptyDir11", vec![]),
                    ],
                ),
                Node::D("emptyDir1", vec![]),
                Node::D("dir2", vec![Node::F("x", 100, 2)]),
            ],
        );
        let right = make_dir(
            "right",
            vec![Node::D("DIR2empty", vec![]), Node::D("dir2", vec![])],
        );

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("a", SyncAction::CopyLeft),
                Expect::F("b", SyncAction::CopyLeft),
                Expect::D(
                    "dir1",
                    SyncAction::CopyLeft,
                    vec![
                        Expect::F("a", SyncAction::CopyLeft),
                        Expect::F("C", SyncAction::CopyLeft),
                        Expect::D(
                            "dir11",
                            SyncAction::CopyLeft,
                            vec![
                                Expect::F("a", SyncAction::CopyLeft),
                                Expect::D("emptyDir111", SyncAction::CopyLeft, vec![]),
                            ],
                        ),
                        Expect::D("emptyDir11", SyncAction::CopyLeft, vec![]),
                    ],
                ),
                Expect::D("emptyDir1", SyncAction::CopyLeft, vec![]),
                Expect::D(
                    "dir2",
                    SyncAction::Equal,
                    vec![Expect::F("x", SyncAction::CopyLeft)],
                ),
                Expect::D("DIR2empty", SyncAction::DeleteRight, vec![]),
            ],
        );
    }

    #[test]
    fn test_overwrite_on_size_or_mtime() {
        let left = make_dir(
            "left",
            vec![
                // 大小相同但右侧更旧
                Node::F("date", 100, 4),
                // 大小不同
                Node::F("size", 10, 4),
            ],
        );
        let right = make_dir(
            "right",
            vec![Node::F("Date", 100, 2), Node::F("Size", 100, 4)],
        );

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("date", SyncAction::Overwrite),
                Expect::F("size", SyncAction::Overwrite),
            ],
        );
    }

    #[test]
    fn test_type_conflict_creates_dependency_pair() {
        let left = make_dir("left", vec![Node::F("x", 100, 4), Node::F("y", 100, 4)]);
        let right = make_dir(
            "right",
            vec![
                Node::D("x", vec![]),
                Node::D("Y", vec![Node::F("a", 100, 4)]),
            ],
        );

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("x", SyncAction::CopyLeft),
                Expect::F("y", SyncAction::CopyLeft),
                Expect::D("x", SyncAction::DeleteRight, vec![]),
                Expect::D(
                    "Y",
                    SyncAction::DeleteRight,
                    vec![Expect::F("a", SyncAction::DeleteRight)],
                ),
            ],
        );

        // COPYLEFT 依赖同名 DELETERIGHT 先完成
        let copy_x = find(&tree, "x", SyncAction::CopyLeft);
        let delete_x = find(&tree, "x", SyncAction::DeleteRight);
        assert_eq!(tree.dependency_of(copy_x), Some(delete_x));

        let copy_y = find(&tree, "y", SyncAction::CopyLeft);
        let delete_y = find(&tree, "Y", SyncAction::DeleteRight);
        assert_eq!(tree.dependency_of(copy_y), Some(delete_y));
    }

    #[test]
    fn test_mixed_actions_case_sensitive() {
        let left = make_dir(
            "left",
            vec![
                Node::F("a", 100, 4),
                Node::F("A", 10, 4),
                Node::F("b", 10, 2),
                Node::D(
                    "dir1",
                    vec![
                        Node::F("a", 100, 2),
                        Node::D(
                            "dir11",
                            vec![
                                Node::F("A", 100, 2),
                                Node::D("DIR111", vec![Node::F("A", 100, 2)]),
                            ],
                        ),
                        Node::D("EmptyDir11", vec![]),
                    ],
                ),
                Node::D("EMPTYDIR", vec![]),
            ],
        );
        let right = make_dir(
            "right",
            vec![
                Node::F("a", 100, 4),
                Node::F("A", 10, 2),
                Node::F("B", 10, 2),
                Node::D(
                    "dir1",
                    vec![
                        Node::F("a", 100, 4),
                        Node::D(
                            "dir11",
                            vec![Node::F("a", 10, 4), Node::D("dir111", vec![])],
                        ),
                    ],
                ),
                Node::D("emptyDir", vec![]),
            ],
        );

        let tree = diff(left, right, &options(true)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("a", SyncAction::Equal),
                Expect::F("A", SyncAction::Overwrite),
                Expect::F("b", SyncAction::CopyLeft),
                Expect::F("B", SyncAction::DeleteRight),
                Expect::D(
                    "dir1",
                    SyncAction::Equal,
                    vec![
                        Expect::F("a", SyncAction::Equal),
                        Expect::D(
                            "dir11",
                            SyncAction::Equal,
                            vec![
                                Expect::F("A", SyncAction::CopyLeft),
                                Expect::F("a", SyncAction::DeleteRight),
                                Expect::D(
                                    "DIR111",
                                    SyncAction::CopyLeft,
                                    vec![Expect::F("A", SyncAction::CopyLeft)],
                                ),
                                Expect::D("dir111", SyncAction::DeleteRight, vec![]),
                            ],
                        ),
                        Expect::D("EmptyDir11", SyncAction::CopyLeft, vec![]),
                    ],
                ),
                Expect::D("EMPTYDIR", SyncAction::CopyLeft, vec![]),
                Expect::D("emptyDir", SyncAction::DeleteRight, vec![]),
            ],
        );
    }

    #[test]
    fn test_right_only_subtree_deletes_recursively() {
        let left = make_dir(
            "left",
            vec![Node::D("dir1", vec![Node::D("dir11", vec![])])],
        );
        let right = make_dir(
            "right",
            vec![
                Node::D(
                    "dir1",
                    vec![
                        Node::F("a", 100, 2),
                        Node::D(
                            "dir11",
                            vec![
                                Node::F("b", 10, 4),
                                Node::D("Dir111", vec![Node::F("c", 100, 2)]),
                            ],
                        ),
                    ],
                ),
                Node::D("dir2", vec![Node::D("dir21", vec![])]),
            ],
        );

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::D(
                    "dir1",
                    SyncAction::Equal,
                    vec![
                        Expect::F("a", SyncAction::DeleteRight),
                        Expect::D(
                            "dir11",
                            SyncAction::Equal,
                            vec![
                                Expect::F("b", SyncAction::DeleteRight),
                                Expect::D(
                                    "Dir111",
                                    SyncAction::DeleteRight,
                                    vec![Expect::F("c", SyncAction::DeleteRight)],
                                ),
                            ],
                        ),
                    ],
                ),
                Expect::D(
                    "dir2",
                    SyncAction::DeleteRight,
                    vec![Expect::D("dir21", SyncAction::DeleteRight, vec![])],
                ),
            ],
        );
    }

    #[test]
    fn test_overwrite_when_right_smaller() {
        // 右侧同名但更小：覆盖；其余仅左侧存在：复制
        let left = make_dir(
            "left",
            vec![
                Node::F("a", 1_000_000, 2),
                Node::F("b", 1_000_000, 2),
                Node::F("C", 1_000_000, 2),
            ],
        );
        let right = make_dir("right", vec![Node::F("A", 10, 2)]);

        let tree = diff(left, right, &options(false)).unwrap();
        assert_children(
            &tree,
            tree.root_id(),
            &[
                Expect::F("a", SyncAction::Overwrite),
                Expect::F("b", SyncAction::CopyLeft),
                Expect::F("C", SyncAction::CopyLeft),
            ],
        );

        let totals = tree.root_totals();
        assert_eq!(totals.copy.size, 3_000_000);
        assert_eq!(totals.copy.files_count, 3);
        assert_eq!(totals.delete.size, 10);
    }
}
