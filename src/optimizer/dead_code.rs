use std::collections::HashSet;

use crate::ir::{Function, InstKind, Type};

use super::pointer_root;

/// Stores into allocas that are never read and whose address never leaks
fn remove_unread_stores(function: &mut Function) -> bool {
    let mut observed = HashSet::new();
    for (_, id) in function.live_instructions() {
        let reads: Vec<_> = match &function.inst(id).kind {
            InstKind::Load { ptr, .. } => vec![ptr.clone()],
            // pointers handed out of the function count as read
            InstKind::Store { value, .. } if function.value_type(value) == Type::Ptr => {
                vec![value.clone()]
            }
            InstKind::Call { args, .. } => args
                .iter()
                .filter(|a| function.value_type(a) == Type::Ptr)
                .cloned()
                .collect(),
            InstKind::Ret { value: Some(value) } if function.value_type(value) == Type::Ptr => {
                vec![value.clone()]
            }
            _ => vec![],
        };
        for ptr in reads {
            if let Some(root) = pointer_root(function, &ptr) {
                observed.insert(root);
            }
        }
    }

    let unread: Vec<_> = function
        .live_instructions()
        .into_iter()
        .filter(|(_, id)| match &function.inst(*id).kind {
            InstKind::Store { ptr, .. } => match pointer_root(function, ptr) {
                Some(root) => !observed.contains(&root),
                None => false,
            },
            _ => false,
        })
        .collect();

    let changed = !unread.is_empty();
    for (block, id) in unread {
        function.remove_inst(block, id);
    }
    changed
}

/// Removes stores nobody can observe and then every side effect free instruction whose value is unused.
pub fn dead_code(function: &mut Function) -> bool {
    let mut changed = remove_unread_stores(function);

    loop {
        let uses = function.use_counts();
        let unused: Vec<_> = function
            .live_instructions()
            .into_iter()
            .filter(|(_, id)| {
                !function.inst(*id).has_side_effects() && uses.get(id).copied().unwrap_or(0) == 0
            })
            .collect();

        if unused.is_empty() {
            break;
        }
        for (block, id) in unused {
            function.remove_inst(block, id);
        }
        changed = true;
    }

    changed
}
