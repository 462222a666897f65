use crate::types::{Event, ParamValue, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParameterChange {
    pub id: String,
    pub name: String,
    pub old: Option<ParamValue>,
    pub new: Option<ParamValue>,
}

impl ParameterChange {
    pub fn into_event(self) -> Event {
        Event::ParameterChanged {
            id: self.id,
            name: self.name,
            old: self.old,
            new: self.new,
        }
    }
}

/// Value-level differences between two snapshots, sorted by numeric id.
///
/// Ids that disappear are reported with `new: None`.
pub(crate) fn diff_parameters(previous: &Snapshot, current: &Snapshot) -> Vec<ParameterChange> {
    let mut changes: Vec<ParameterChange> = current
        .parameters
        .iter()
        .filter_map(|(id, param)| {
            let old = previous.get(id).and_then(|p| p.value.clone());
            let seen = previous.get(id).is_some();
            if seen && old == param.value {
                return None;
            }
            Some(ParameterChange {
                id: id.clone(),
                name: param.name.clone(),
                old,
                new: param.value.clone(),
            })
        })
        .collect();

    changes.extend(
        previous
            .parameters
            .iter()
            .filter(|(id, _)| current.get(id).is_none())
            .map(|(id, param)| ParameterChange {
                id: id.clone(),
                name: param.name.clone(),
                old: param.value.clone(),
                new: None,
            }),
    );

    changes.sort_by(|a, b| id_order(&a.id).cmp(&id_order(&b.id)));
    changes
}

fn id_order(id: &str) -> (u64, &str) {
    (id.parse().unwrap_or(u64::MAX), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Parameter;

    #[test]
    fn identical_snapshots_have_no_changes() {
        let snap = Snapshot::from_parameters([Parameter::new("1", "A", 1)]);
        assert!(diff_parameters(&snap, &snap).is_empty());
    }

    #[test]
    fn changed_added_and_removed_ids_reported() {
        let prev = Snapshot::from_parameters([
            Parameter::new("2", "B", 1),
            Parameter::new("10", "C", 5),
        ]);
        let curr = Snapshot::from_parameters([
            Parameter::new("2", "B", 2),
            Parameter::new("3", "D", 7),
        ]);
        let changes = diff_parameters(&prev, &curr);
        let ids: Vec<&str> = changes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "10"]);
        assert_eq!(changes[0].old, Some(ParamValue::Int(1)));
        assert_eq!(changes[0].new, Some(ParamValue::Int(2)));
        assert_eq!(changes[1].old, None);
        assert_eq!(changes[2].new, None);
    }

    #[test]
    fn int_to_float_counts_as_change() {
        let prev = Snapshot::from_parameters([Parameter::new("288", "T", 22)]);
        let curr = Snapshot::from_parameters([Parameter::new("288", "T", 22.0)]);
        assert_eq!(diff_parameters(&prev, &curr).len(), 1);
    }
}
