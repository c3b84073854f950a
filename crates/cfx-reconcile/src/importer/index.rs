//! Batch-wide view of every declared node.
//!
//! Built once before Resolving. Rejects malformed batches (empty or
//! duplicate Pids, nested areas, declared supertype or attribute-list
//! cycles) and fixes the order in which a pass visits declarations.

use std::collections::{BTreeMap, BTreeSet};

use cfx_model::{ConfigurationAreaProperties, DeclaredProperty, Pid, PropertyKind};
use cfx_store::{At, ObjectBody, ObjectStore};

use crate::context::lookup_current;
use crate::{ImportError, Result, StructuralConflict};

/// Position of a declaration within one Resolving pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Rank {
    Area,
    TypeLike(PropertyKind),
    ConfiguringObject,
    DynamicObject,
}

enum Slot<'b> {
    /// Index into `DeclarationIndex::areas`.
    Area(usize),
    Member {
        prop: &'b DeclaredProperty,
        area: Pid,
    },
}

pub(crate) struct DeclarationIndex<'b> {
    /// Area headers without their object lists.
    areas: Vec<DeclaredProperty>,
    slots: BTreeMap<Pid, (Slot<'b>, Rank)>,
    ordered: Vec<Pid>,
}

impl<'b> DeclarationIndex<'b> {
    pub(crate) fn build(
        batch: &'b [ConfigurationAreaProperties],
        store: &dyn ObjectStore,
    ) -> Result<Self> {
        let mut index = Self {
            areas: Vec::with_capacity(batch.len()),
            slots: BTreeMap::new(),
            ordered: Vec::new(),
        };
        let mut in_order: Vec<(Rank, usize, Pid)> = Vec::new();

        for area in batch {
            let pid = &area.header.pid;
            index.claim(pid)?;
            let slot = Slot::Area(index.areas.len());
            index.areas.push(DeclaredProperty::ConfigurationArea(ConfigurationAreaProperties {
                objects: Vec::new(),
                ..area.clone()
            }));
            index.slots.insert(pid.clone(), (slot, Rank::Area));
            in_order.push((Rank::Area, in_order.len(), pid.clone()));
        }

        for area in batch {
            for prop in &area.objects {
                let pid = prop.pid();
                index.claim(pid)?;
                if prop.kind() == PropertyKind::ConfigurationArea {
                    return Err(ImportError::invalid(pid, "areas cannot be nested"));
                }
                index.slots.insert(
                    pid.clone(),
                    (
                        Slot::Member {
                            prop,
                            area: area.header.pid.clone(),
                        },
                        Rank::Area,
                    ),
                );
            }
        }

        // Ranks of objects depend on their type, which may itself be declared.
        for area in batch {
            for prop in &area.objects {
                let rank = match prop {
                    DeclaredProperty::Object(o) => {
                        if index.type_is_configuring(&o.object_type, store)? {
                            Rank::ConfiguringObject
                        } else {
                            Rank::DynamicObject
                        }
                    }
                    other => Rank::TypeLike(other.kind()),
                };
                if let Some(entry) = index.slots.get_mut(prop.pid()) {
                    entry.1 = rank;
                }
                in_order.push((rank, in_order.len(), prop.pid().clone()));
            }
        }

        index.check_supertype_cycles()?;
        index.check_list_cycles()?;

        in_order.sort();
        index.ordered = in_order.into_iter().map(|(_, _, pid)| pid).collect();
        Ok(index)
    }

    fn claim(&self, pid: &Pid) -> Result<()> {
        if pid.is_empty() {
            return Err(ImportError::invalid(pid, "empty pid"));
        }
        if self.slots.contains_key(pid) {
            return Err(ImportError::invalid(pid, "pid declared twice"));
        }
        Ok(())
    }

    fn type_is_configuring(&self, type_pid: &Pid, store: &dyn ObjectStore) -> Result<bool> {
        if let Some(prop) = self.get(type_pid) {
            return match prop {
                DeclaredProperty::SystemObjectType(t) => Ok(t.configuring),
                other => Err(ImportError::invalid(
                    type_pid,
                    format!("{} used as object type", other.kind().as_str()),
                )),
            };
        }
        let id = lookup_current(store, type_pid)
            .ok_or_else(|| ImportError::unresolved(type_pid, "object type"))?;
        match store.object(id, At::Modifiable)?.body {
            ObjectBody::SystemObjectType { configuring, .. } => Ok(configuring),
            other => Err(ImportError::invalid(
                type_pid,
                format!("{} used as object type", other.label()),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Static cycle checks
    // -----------------------------------------------------------------------

    fn check_supertype_cycles(&self) -> Result<()> {
        let edges = |pid: &Pid| -> Vec<Pid> {
            match self.get(pid) {
                Some(DeclaredProperty::SystemObjectType(t)) => t.supertypes.clone(),
                _ => Vec::new(),
            }
        };
        self.find_cycle(PropertyKind::SystemObjectType, edges)
            .map_or(Ok(()), |pid| Err(StructuralConflict::SupertypeCycle(pid).into()))
    }

    fn check_list_cycles(&self) -> Result<()> {
        let edges = |pid: &Pid| -> Vec<Pid> {
            match self.get(pid) {
                Some(DeclaredProperty::AttributeList(l)) => {
                    l.attributes.iter().map(|a| a.attribute_type.clone()).collect()
                }
                _ => Vec::new(),
            }
        };
        self.find_cycle(PropertyKind::AttributeList, edges)
            .map_or(Ok(()), |pid| Err(StructuralConflict::AttributeListCycle(pid).into()))
    }

    /// First declaration of `kind` that reaches itself through `edges`.
    fn find_cycle(&self, kind: PropertyKind, edges: impl Fn(&Pid) -> Vec<Pid>) -> Option<Pid> {
        let mut done = BTreeSet::new();
        for (pid, (_, rank)) in &self.slots {
            if *rank != Rank::TypeLike(kind) || done.contains(pid) {
                continue;
            }
            let mut on_path = BTreeSet::new();
            if let Some(hit) = visit(pid, &edges, &mut on_path, &mut done) {
                return Some(hit);
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub(crate) fn get(&self, pid: &Pid) -> Option<&DeclaredProperty> {
        match self.slots.get(pid)? {
            (Slot::Area(i), _) => self.areas.get(*i),
            (Slot::Member { prop, .. }, _) => Some(*prop),
        }
    }

    pub(crate) fn contains(&self, pid: &Pid) -> bool {
        self.slots.contains_key(pid)
    }

    #[cfg(test)]
    pub(crate) fn rank(&self, pid: &Pid) -> Option<Rank> {
        self.slots.get(pid).map(|(_, rank)| *rank)
    }

    /// Area Pid a declaration lives in; areas live in themselves.
    pub(crate) fn area_of(&self, pid: &Pid) -> Option<&Pid> {
        let (key, (slot, _)) = self.slots.get_key_value(pid)?;
        match slot {
            Slot::Area(_) => Some(key),
            Slot::Member { area, .. } => Some(area),
        }
    }

    /// Every declaration, in Resolving order.
    pub(crate) fn ordered(&self) -> &[Pid] {
        &self.ordered
    }

    pub(crate) fn area_pids(&self) -> impl Iterator<Item = &Pid> {
        self.areas.iter().map(|a| a.pid())
    }
}

fn visit(
    pid: &Pid,
    edges: &impl Fn(&Pid) -> Vec<Pid>,
    on_path: &mut BTreeSet<Pid>,
    done: &mut BTreeSet<Pid>,
) -> Option<Pid> {
    if on_path.contains(pid) {
        return Some(pid.clone());
    }
    if done.contains(pid) {
        return None;
    }
    on_path.insert(pid.clone());
    for next in edges(pid) {
        if let Some(hit) = visit(&next, edges, on_path, done) {
            return Some(hit);
        }
    }
    on_path.remove(pid);
    done.insert(pid.clone());
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_model::{
        AttributeDecl, AttributeListProperties, PropertyHeader, SystemObjectTypeProperties,
    };
    use cfx_store::MemoryStore;

    fn area(pid: &str, objects: Vec<DeclaredProperty>) -> ConfigurationAreaProperties {
        let mut a = ConfigurationAreaProperties::new(PropertyHeader::new(pid, pid), "authority.default");
        a.objects = objects;
        a
    }

    fn sot(pid: &str, supertypes: &[&str]) -> DeclaredProperty {
        DeclaredProperty::SystemObjectType(SystemObjectTypeProperties {
            header: PropertyHeader::new(pid, pid),
            configuring: true,
            persistence_mode: None,
            supertypes: supertypes.iter().map(|s| Pid::new(*s)).collect(),
            attribute_groups: Vec::new(),
            set_uses: Vec::new(),
            default_parameters: Vec::new(),
        })
    }

    #[test]
    fn areas_come_first_and_types_before_objects() {
        let store = MemoryStore::new().unwrap();
        let batch = vec![area(
            "kv.a",
            vec![
                DeclaredProperty::Object(cfx_model::ObjectProperties {
                    header: PropertyHeader::new("obj.1", "o"),
                    object_type: Pid::new("typ.a"),
                    datasets: Vec::new(),
                    sets: Vec::new(),
                }),
                sot("typ.a", &[]),
            ],
        )];
        let index = DeclarationIndex::build(&batch, &store).unwrap();
        let order: Vec<&str> = index.ordered().iter().map(|p| p.as_str()).collect();
        assert_eq!(order, vec!["kv.a", "typ.a", "obj.1"]);
        assert_eq!(index.area_of(&Pid::new("obj.1")), Some(&Pid::new("kv.a")));
        assert_eq!(index.area_of(&Pid::new("kv.a")), Some(&Pid::new("kv.a")));
        assert_eq!(index.rank(&Pid::new("obj.1")), Some(Rank::ConfiguringObject));
    }

    #[test]
    fn duplicate_and_empty_pids_are_rejected() {
        let store = MemoryStore::new().unwrap();
        let dup = vec![area("kv.a", vec![sot("typ.a", &[]), sot("typ.a", &[])])];
        assert!(DeclarationIndex::build(&dup, &store).is_err());

        let empty = vec![area("kv.a", vec![sot(" ", &[])])];
        assert!(DeclarationIndex::build(&empty, &store).is_err());
    }

    #[test]
    fn declared_supertype_cycle_is_structural() {
        let store = MemoryStore::new().unwrap();
        let batch = vec![area("kv.a", vec![sot("typ.a", &["typ.b"]), sot("typ.b", &["typ.a"])])];
        let err = DeclarationIndex::build(&batch, &store).err().unwrap();
        assert!(matches!(
            err,
            ImportError::StructuralConflict(StructuralConflict::SupertypeCycle(_))
        ));
    }

    #[test]
    fn self_containing_attribute_list_is_structural() {
        let store = MemoryStore::new().unwrap();
        let list = DeclaredProperty::AttributeList(AttributeListProperties {
            header: PropertyHeader::new("atl.loop", "loop"),
            attributes: vec![AttributeDecl::new("inner", "atl.loop")],
        });
        let batch = vec![area("kv.a", vec![list])];
        let err = DeclarationIndex::build(&batch, &store).err().unwrap();
        assert!(matches!(
            err,
            ImportError::StructuralConflict(StructuralConflict::AttributeListCycle(_))
        ));
    }

    #[test]
    fn unknown_object_type_is_unresolved() {
        let store = MemoryStore::new().unwrap();
        let batch = vec![area(
            "kv.a",
            vec![DeclaredProperty::Object(cfx_model::ObjectProperties {
                header: PropertyHeader::new("obj.1", "o"),
                object_type: Pid::new("typ.missing"),
                datasets: Vec::new(),
                sets: Vec::new(),
            })],
        )];
        let err = DeclarationIndex::build(&batch, &store).err().unwrap();
        assert!(matches!(err, ImportError::UnresolvedReference { .. }));
    }
}
