//! 事务树：以 id 为索引的节点集合、依赖邻接表与自底向上的状态聚合

use crate::core::errors::TransactionErrorInfo;
use crate::core::transaction::{
    DiffTotals, NodeStatusSnapshot, SyncStatus, TransactionId, TransactionNode,
};
use crate::storage::EntryHandle;
use std::collections::HashMap;
use tokio::sync::watch;

/// 一次 diff 产出的完整事务树
///
/// 节点以 id 寻址，依赖边独立于节点存放，避免节点间相互引用
#[derive(Debug)]
pub struct TransactionTree {
    pub(crate) nodes: HashMap<TransactionId, TransactionNode>,
    pub(crate) root: TransactionId,
    /// 依赖边：dependant -> dependency
    pub(crate) dependency_of: HashMap<TransactionId, TransactionId>,
    /// 反向邻接：dependency -> dependants
    pub(crate) dependants_of: HashMap<TransactionId, Vec<TransactionId>>,
}

impl TransactionTree {
    pub fn root_id(&self) -> TransactionId {
        self.root
    }

    pub fn node(&self, id: TransactionId) -> Option<&TransactionNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TransactionNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children_of(&self, id: TransactionId) -> &[TransactionId] {
        self.nodes
            .get(&id)
            .map(|n| n.children())
            .unwrap_or_default()
    }

    /// 事务尚未解除的依赖
    pub fn dependency_of(&self, id: TransactionId) -> Option<TransactionId> {
        self.dependency_of.get(&id).copied()
    }

    pub fn has_dependency(&self, id: TransactionId) -> bool {
        self.dependency_of.contains_key(&id)
    }

    /// 事务是否需要被调度
    pub fn needs_sync(&self, id: TransactionId) -> bool {
        self.nodes
            .get(&id)
            .map(|n| n.requires_sync())
            .unwrap_or(false)
    }

    /// 按节点 id 订阅状态快照
    pub fn subscribe(&self, id: TransactionId) -> Option<watch::Receiver<NodeStatusSnapshot>> {
        self.nodes.get(&id).map(|n| n.subscribe())
    }

    /// 根目录的三类汇总
    pub fn root_totals(&self) -> DiffTotals {
        self.nodes
            .get(&self.root)
            .map(|n| n.diff_stats().totals())
            .unwrap_or_default()
    }

    /// 应用一次状态变更并向上重算聚合
    pub(crate) fn apply_status(
        &mut self,
        id: TransactionId,
        status: SyncStatus,
        timestamp: i64,
        msg: &str,
        error: Option<TransactionErrorInfo>,
    ) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_status(status, timestamp, msg, error);
        }
        self.propagate_from(id);
    }

    /// 自底向上的聚合级联
    ///
    /// 每层重算两个值：仅子级的聚合与自身加子级的聚合；
    /// 后者不变即停止，避免冗余级联
    fn propagate_from(&mut self, id: TransactionId) {
        let mut current = id;
        loop {
            let (aggr, parent) = {
                let Some(node) = self.nodes.get_mut(&current) else {
                    return;
                };

                let children_aggr = if node.children_to_sync.is_empty() {
                    SyncStatus::NotRequired
                } else {
                    SyncStatus::aggregate(node.children_to_sync.values().copied())
                };
                if children_aggr != node.children_aggr {
                    node.children_aggr = children_aggr;
                    node.publish();
                }

                let new_aggr = SyncStatus::aggregate(
                    std::iter::once(node.status).chain(node.children_to_sync.values().copied()),
                );
                if new_aggr == node.aggr {
                    return;
                }
                node.aggr = new_aggr;
                node.publish();
                (new_aggr, node.parent)
            };

            let Some(parent_id) = parent else {
                return;
            };
            let Some(parent_node) = self.nodes.get_mut(&parent_id) else {
                return;
            };
            // 只有被父节点跟踪的子级才继续向上冒泡
            match parent_node.children_to_sync.get_mut(&current) {
                Some(slot) => *slot = aggr,
                None => return,
            }
            current = parent_id;
        }
    }

    /// 递归标记需要同步的后代（目录递归删除的级联）
    pub(crate) fn set_status_recursive(
        &mut self,
        id: TransactionId,
        status: SyncStatus,
        timestamp: i64,
        msg: &str,
        error: Option<&TransactionErrorInfo>,
    ) {
        let mut targets = Vec::new();
        self.collect_tracked_descendants(id, &mut targets);
        for target in targets {
            self.apply_status(target, status, timestamp, msg, error.cloned());
        }
    }

    fn collect_tracked_descendants(&self, id: TransactionId, acc: &mut Vec<TransactionId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for child in node.children() {
            if node.children_to_sync.contains_key(child) {
                acc.push(*child);
            }
            self.collect_tracked_descendants(*child, acc);
        }
    }

    /// 目录创建完成后为其子事务补齐右侧父句柄
    pub(crate) fn bind_children_right_parent(&mut self, id: TransactionId, handle: &EntryHandle) {
        let children = self.children_of(id).to_vec();
        for child in children {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.bind_right_parent(handle.clone());
            }
        }
    }

    /// 取走全部依赖者并解除它们的依赖边
    pub(crate) fn take_dependants(&mut self, id: TransactionId) -> Vec<TransactionId> {
        let dependants = self.dependants_of.remove(&id).unwrap_or_default();
        for dependant in &dependants {
            self.dependency_of.remove(dependant);
        }
        dependants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncOptions;
    use crate::core::diff::diff;
    use crate::core::scanner::test_support::{make_dir, Node};
    use crate::core::transaction::{now_millis, SyncAction};

    fn options() -> SyncOptions {
        SyncOptions {
            is_case_sensitive: false,
            ..SyncOptions::default()
        }
    }

    fn find_by_name(tree: &TransactionTree, name: &str, action: SyncAction) -> TransactionId {
        tree.nodes()
            .find(|n| n.name() == name && n.action() == action)
            .map(|n| n.id())
            .unwrap_or_else(|| panic!("transaction '{name}' ({action:?}) not found"))
    }

    #[test]
    fn test_leaf_status_bubbles_to_root_aggregate() {
        let left = make_dir(
            "left",
            vec![Node::D("dir1", vec![Node::F("a", 10, 1)])],
        );
        let right = make_dir("right", vec![]);
        let mut tree = diff(left, right, &options()).unwrap();

        let file_id = find_by_name(&tree, "a", SyncAction::CopyLeft);
        let dir_id = find_by_name(&tree, "dir1", SyncAction::CopyLeft);
        let root_id = tree.root_id();

        assert_eq!(tree.node(root_id).unwrap().children_aggr(), SyncStatus::Init);

        tree.apply_status(file_id, SyncStatus::Wip, now_millis(), "start", None);
        // dir1 自身仍是 Init，子级 Wip：聚合为 Wip
        assert_eq!(tree.node(dir_id).unwrap().aggr(), SyncStatus::Wip);
        assert_eq!(tree.node(root_id).unwrap().children_aggr(), SyncStatus::Wip);

        tree.apply_status(file_id, SyncStatus::Success, now_millis(), "ok", None);
        tree.apply_status(dir_id, SyncStatus::Success, now_millis(), "ok", None);
        assert_eq!(tree.node(dir_id).unwrap().aggr(), SyncStatus::Success);
        assert_eq!(
            tree.node(root_id).unwrap().children_aggr(),
            SyncStatus::Success
        );
    }

    #[test]
    fn test_error_and_success_mix_to_mixed() {
        let left = make_dir("left", vec![Node::F("a", 10, 1), Node::F("b", 10, 1)]);
        let right = make_dir("right", vec![]);
        let mut tree = diff(left, right, &options()).unwrap();

        let a_id = find_by_name(&tree, "a", SyncAction::CopyLeft);
        let b_id = find_by_name(&tree, "b", SyncAction::CopyLeft);
        let root_id = tree.root_id();

        tree.apply_status(a_id, SyncStatus::Success, now_millis(), "ok", None);
        tree.apply_status(
            b_id,
            SyncStatus::Error,
            now_millis(),
            "boom",
            Some(TransactionErrorInfo {
                error_msg: "boom".to_string(),
                cleanup_msg: "无需清理".to_string(),
            }),
        );

        assert_eq!(
            tree.node(root_id).unwrap().children_aggr(),
            SyncStatus::Mixed
        );
        assert!(tree.node(b_id).unwrap().error().is_some());
    }

    #[test]
    fn test_subscription_sees_changes() {
        let left = make_dir("left", vec![Node::F("a", 10, 1)]);
        let right = make_dir("right", vec![]);
        let mut tree = diff(left, right, &options()).unwrap();

        let a_id = find_by_name(&tree, "a", SyncAction::CopyLeft);
        let mut rx = tree.subscribe(a_id).unwrap();
        assert_eq!(rx.borrow().status, SyncStatus::Init);

        tree.apply_status(a_id, SyncStatus::Wip, now_millis(), "start", None);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, SyncStatus::Wip);
    }
}
