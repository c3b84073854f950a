//! Live state back to declared configuration bundles.
//!
//! # Purpose
//! The exporter is the inverse of the importer: importing what it produced
//! changes nothing. It reads one area as of a given version and rebuilds the
//! declared shape of every top-level object valid there.
//!
//! # Ordering
//! Objects are sorted by a collation key of their Pid (case-insensitive,
//! accent-folded), with the raw Pid as tiebreak, so that bundles diff well
//! regardless of creation order.

use std::cmp::Ordering;
use std::path::PathBuf;

use cfx_bundle::{BundleCodec, BundleDirectory};
use cfx_model::{
    AspectProperties, AspectUsageDecl, AttributeDecl, AttributeGroupProperties,
    AttributeListProperties, AttributeTypeKind, AttributeTypeProperties,
    ConfigurationAreaProperties, DatasetDecl, DeclaredProperty, IntegerTypeDecl,
    ObjectProperties, ObjectSetDecl, ObjectSetTypeProperties, Pid, PropertyHeader, SetUseDecl,
    SystemObjectTypeProperties, ValueRangeDecl, ValueStateDecl,
};
use cfx_store::meta::{
    SET_ATTRIBUTE_GROUPS, SET_OBJECT_TYPES, SET_SET_USES, SET_SUPERTYPES, TYPE_ASPECT,
};
use cfx_store::{query, At, ObjectBody, ObjectId, ObjectStore, ObjectView, Version};
use tracing::{debug, info, warn};

use crate::context::lookup_current;
use crate::schema::stored_attributes;
use crate::values::decode_tree;
use crate::{authority, defaults, ExportOptions, ImportError, Result};

pub struct Exporter<'s> {
    store: &'s dyn ObjectStore,
    options: ExportOptions,
}

impl<'s> Exporter<'s> {
    pub fn new(store: &'s dyn ObjectStore, options: ExportOptions) -> Self {
        Self { store, options }
    }

    /// Declared form of area `area_pid` as of `at`.
    ///
    /// `At::Modifiable` exports the draft state including unpublished changes.
    pub fn export_area(&self, area_pid: &Pid, at: At) -> Result<ConfigurationAreaProperties> {
        let store = self.store;
        let area_id = lookup_current(store, area_pid)
            .ok_or_else(|| ImportError::unresolved(area_pid, "configuration area"))?;
        let version = match at {
            At::Version(v) => v,
            At::Modifiable => store.area_versions(area_id)?.modifiable(),
        };
        let at = At::Version(version);
        let area = store.object(area_id, at)?;
        let ObjectBody::ConfigurationArea { authority: live } = area.body else {
            return Err(ImportError::invalid(
                area_pid,
                format!("expected a configuration area, found {}", area.body.label()),
            ));
        };

        let authority = match authority::pending(store, area_id, at)? {
            Some((pending, effective_from)) if effective_from <= version => Some(pending),
            _ => live,
        };
        let mut out = ConfigurationAreaProperties::new(
            header(&area),
            authority.map(|id| query::pid_of(store, id)).unwrap_or_default(),
        );
        out.change_log = store.change_log(area_id, at)?;

        for id in store.objects_in_area(area_id)? {
            if id == area_id {
                continue;
            }
            let view = store.object(id, at)?;
            if !self.is_exported(&view, version) {
                continue;
            }
            if let Some(prop) = self.rebuild(&view, version)? {
                out.objects.push(prop);
            }
        }
        out.objects
            .sort_by(|a, b| collate(a.pid().as_str(), b.pid().as_str()));

        info!(area = %area_pid, version, objects = out.objects.len(), "area exported");
        Ok(out)
    }

    /// Writes one bundle per area into `dir`; returns the written paths in order.
    pub fn export_to_directory<C: BundleCodec>(
        &self,
        dir: &BundleDirectory<C>,
        areas: &[Pid],
        at: At,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(areas.len());
        for pid in areas {
            let area = self.export_area(pid, at)?;
            written.push(dir.write_area(&area)?);
        }
        Ok(written)
    }

    fn is_exported(&self, view: &ObjectView, version: Version) -> bool {
        view.owner.is_none()
            && !view.body.is_substructure()
            && !matches!(view.body, ObjectBody::ConfigurationArea { .. })
            && view.is_valid_at(version)
            && !view.pid.is_empty()
            && !self.is_hidden(&view.pid)
    }

    fn is_hidden(&self, pid: &Pid) -> bool {
        self.options.hidden_attribute_groups.contains(pid)
    }

    fn pid(&self, id: ObjectId) -> Pid {
        query::pid_of(self.store, id)
    }

    fn member_pids(&self, owner: ObjectId, set_name: &str, at: At) -> Result<Vec<Pid>> {
        Ok(query::members_of(self.store, owner, set_name, at)?
            .into_iter()
            .map(|id| self.pid(id))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Per-kind rebuild
    // -----------------------------------------------------------------------

    fn rebuild(&self, view: &ObjectView, version: Version) -> Result<Option<DeclaredProperty>> {
        let at = At::Version(version);
        let header = header(view);
        let prop = match &view.body {
            ObjectBody::Plain => {
                if view.type_id == self.store.meta_id(TYPE_ASPECT)? {
                    DeclaredProperty::Aspect(AspectProperties { header })
                } else {
                    DeclaredProperty::Object(self.object(view, header, version)?)
                }
            }
            ObjectBody::StringType { max_length, encoding } => attribute_type(
                header,
                AttributeTypeKind::String {
                    max_length: *max_length,
                    encoding: encoding.clone(),
                },
            ),
            ObjectBody::IntegerType { byte_count, range } => {
                let kind = AttributeTypeKind::Integer(self.integer_type(view.id, *byte_count, *range, at)?);
                attribute_type(header, kind)
            }
            ObjectBody::DoubleType { unit, accuracy } => attribute_type(
                header,
                AttributeTypeKind::Double {
                    unit: unit.clone(),
                    accuracy: *accuracy,
                },
            ),
            ObjectBody::TimeType { relative, accuracy } => attribute_type(
                header,
                AttributeTypeKind::Time {
                    relative: *relative,
                    accuracy: *accuracy,
                },
            ),
            ObjectBody::ReferenceType {
                referenced_type,
                undefined_allowed,
                reference_kind,
            } => attribute_type(
                header,
                AttributeTypeKind::Reference {
                    referenced_type: referenced_type.map(|id| self.pid(id)),
                    undefined_allowed: *undefined_allowed,
                    reference_kind: *reference_kind,
                },
            ),
            ObjectBody::AttributeList => DeclaredProperty::AttributeList(AttributeListProperties {
                header,
                attributes: self.attributes(view.id, at)?,
            }),
            ObjectBody::AttributeGroup {
                configuring,
                parameter,
            } => DeclaredProperty::AttributeGroup(AttributeGroupProperties {
                header,
                configuring: *configuring,
                parameter: *parameter,
                aspects: self.aspect_usages(view.id, at)?,
                attributes: self.attributes(view.id, at)?,
            }),
            ObjectBody::ObjectSetType {
                minimum,
                maximum,
                mutable,
                reference_kind,
            } => {
                let mut element_types = self.member_pids(view.id, SET_OBJECT_TYPES, at)?;
                element_types.sort_by(|a, b| collate(a.as_str(), b.as_str()));
                DeclaredProperty::ObjectSetType(ObjectSetTypeProperties {
                    header,
                    element_types,
                    minimum: *minimum,
                    maximum: *maximum,
                    mutable: *mutable,
                    reference_kind: *reference_kind,
                })
            }
            ObjectBody::SystemObjectType {
                configuring,
                persistence_mode,
            } => DeclaredProperty::SystemObjectType(self.object_type(
                view.id,
                header,
                *configuring,
                *persistence_mode,
                at,
            )?),
            other => {
                debug!(pid = %view.pid, body = other.label(), "not exportable");
                return Ok(None);
            }
        };
        Ok(Some(prop))
    }

    fn integer_type(
        &self,
        id: ObjectId,
        byte_count: u8,
        range: Option<ObjectId>,
        at: At,
    ) -> Result<IntegerTypeDecl> {
        let range = match range {
            Some(r) => {
                let view = self.store.object(r, at)?;
                match view.body {
                    ObjectBody::IntegerValueRange {
                        minimum,
                        maximum,
                        scale,
                        unit,
                    } => Some(ValueRangeDecl {
                        minimum,
                        maximum,
                        scale,
                        unit,
                        info: view.info,
                    }),
                    _ => None,
                }
            }
            None => None,
        };
        let states = query::states_of(self.store, id, at)?
            .into_iter()
            .filter_map(|s| match s.body {
                ObjectBody::IntegerValueState { value } => Some(ValueStateDecl {
                    name: s.name,
                    value,
                    info: s.info,
                }),
                _ => None,
            })
            .collect();
        Ok(IntegerTypeDecl {
            byte_count,
            range,
            states,
        })
    }

    fn attributes(&self, owner: ObjectId, at: At) -> Result<Vec<AttributeDecl>> {
        Ok(query::attributes_of(self.store, owner, at)?
            .into_iter()
            .filter_map(|a| match a.body {
                ObjectBody::Attribute {
                    max_count,
                    variable_count,
                    attribute_type,
                    default,
                    ..
                } => Some(AttributeDecl {
                    name: a.name,
                    info: a.info,
                    attribute_type: self.pid(attribute_type),
                    max_count,
                    variable_count,
                    default,
                }),
                _ => None,
            })
            .collect())
    }

    /// A lone implicit usage is the default an empty declaration stands for.
    fn aspect_usages(&self, atg: ObjectId, at: At) -> Result<Vec<AspectUsageDecl>> {
        let usages = query::usages_of(self.store, atg, at)?;
        if let [only] = usages.as_slice() {
            if matches!(only.body, ObjectBody::AttributeGroupUsage { explicit: false, .. }) {
                return Ok(Vec::new());
            }
        }
        let mut out: Vec<AspectUsageDecl> = usages
            .into_iter()
            .filter_map(|u| match u.body {
                ObjectBody::AttributeGroupUsage { aspect, usage, .. } => Some(AspectUsageDecl {
                    aspect: self.pid(aspect),
                    usage,
                }),
                _ => None,
            })
            .collect();
        out.sort_by(|a, b| collate(a.aspect.as_str(), b.aspect.as_str()));
        Ok(out)
    }

    fn object_type(
        &self,
        id: ObjectId,
        header: PropertyHeader,
        configuring: bool,
        persistence_mode: Option<cfx_model::PersistenceMode>,
        at: At,
    ) -> Result<SystemObjectTypeProperties> {
        let set_uses = query::member_views(self.store, id, SET_SET_USES, at)?
            .into_iter()
            .filter_map(|u| match u.body {
                ObjectBody::ObjectSetUse {
                    set_name,
                    set_type,
                    required,
                } => Some(SetUseDecl {
                    name: set_name,
                    set_type: self.pid(set_type),
                    required,
                }),
                _ => None,
            })
            .collect();
        let default_parameters = match self.store.dataset(id, defaults::usage(self.store)?, at)? {
            Some(data) => defaults::decode(&data, self.store)?,
            None => Vec::new(),
        };
        Ok(SystemObjectTypeProperties {
            header,
            configuring,
            persistence_mode,
            supertypes: self.member_pids(id, SET_SUPERTYPES, at)?,
            attribute_groups: self.member_pids(id, SET_ATTRIBUTE_GROUPS, at)?,
            set_uses,
            default_parameters,
        })
    }

    fn object(&self, view: &ObjectView, header: PropertyHeader, version: Version) -> Result<ObjectProperties> {
        let store = self.store;
        let at = At::Version(version);
        let mut datasets = Vec::new();
        for (usage, data) in store.datasets(view.id, at)? {
            let ObjectBody::AttributeGroupUsage {
                attribute_group,
                aspect,
                ..
            } = store.object(usage, at)?.body
            else {
                warn!(pid = %view.pid, usage = %usage, "dataset stored under a non-usage object skipped");
                continue;
            };
            let group = self.pid(attribute_group);
            if self.is_hidden(&group) {
                continue;
            }
            let schema = stored_attributes(store, attribute_group, at)?;
            datasets.push(DatasetDecl {
                attribute_group: group,
                aspect: self.pid(aspect),
                data: decode_tree(&schema, &data, store),
            });
        }
        datasets.sort_by(|a, b| {
            collate(a.attribute_group.as_str(), b.attribute_group.as_str())
                .then_with(|| collate(a.aspect.as_str(), b.aspect.as_str()))
        });

        let mut sets = Vec::new();
        for (name, set) in store.sets_of(view.id) {
            let set_view = store.object(set, at)?;
            if !set_view.is_valid_at(version) {
                continue;
            }
            let elements = store
                .members(set, at)?
                .into_iter()
                .map(|id| self.pid(id))
                .collect();
            sets.push(ObjectSetDecl { name, elements });
        }
        sets.sort_by(|a, b| collate(&a.name, &b.name));

        Ok(ObjectProperties {
            header,
            object_type: self.pid(view.type_id),
            datasets,
            sets,
        })
    }
}

fn header(view: &ObjectView) -> PropertyHeader {
    PropertyHeader::new(view.pid.clone(), view.name.clone()).with_info(view.info.clone())
}

fn attribute_type(header: PropertyHeader, kind: AttributeTypeKind) -> DeclaredProperty {
    DeclaredProperty::AttributeType(AttributeTypeProperties { header, kind })
}

// ---------------------------------------------------------------------------
// Collation
// ---------------------------------------------------------------------------

/// Primary collation key: lowercase with Latin diacritics folded away.
///
/// Umlauts fold to their base letter (`ä` sorts with `a`); ligatures and
/// `ß` expand. Words equal under the key fall back to raw text order.
fn collation_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => out.push('a'),
            'æ' => out.push_str("ae"),
            'ç' | 'č' | 'ć' => out.push('c'),
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'ñ' | 'ň' => out.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => out.push('o'),
            'œ' => out.push_str("oe"),
            'ř' => out.push('r'),
            'š' | 'ś' => out.push('s'),
            'ß' => out.push_str("ss"),
            'ù' | 'ú' | 'û' | 'ü' | 'ů' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'ž' | 'ź' | 'ż' => out.push('z'),
            other => out.push(other),
        }
    }
    out
}

fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
