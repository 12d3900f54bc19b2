//! Profile data access
//!
//! The [`ProfileService`] is the layer callers use to read and edit a
//! profile: the parent document under `teams/{id}` and its `links`
//! sub-collection. Section writes carry a version marker, link edits go
//! through the [`Reconciler`].
//!
//! ## Architecture
//!
//! ```text
//!                  ┌────────────────┐
//!                  │ ProfileService │
//!                  └────────────────┘
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        │                 │                  │
//!        ▼                 ▼                  ▼
//! ┌─────────────┐  ┌──────────────────┐  ┌──────────┐
//! │ Reconciler  │  │ FreshnessTracker │  │  Events  │
//! │ (links)     │  │ (LocalStore)     │  │ (notify) │
//! └─────────────┘  └──────────────────┘  └──────────┘
//!        │
//!        ▼
//! ┌───────────────┐
//! │ DocumentStore │
//! └───────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod summary;

pub use summary::{Member, ProfileSummary, parse_timestamp};

use crate::config::{FreshnessConfig, ProfileConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::event::{EventSink, SyncEvent};
use crate::freshness::{Freshness, FreshnessTracker, VersionMarker};
use crate::model::{Category, CollectionPath, DocumentPath, Fields, Filter, Item, WriteMode};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::StoreRegistry;
use crate::traits::{DocumentStore, LocalStore};

/// Sub-collection of a user document holding its profiles
const ACTIVE_PROFILES_COLLECTION: &str = "profiles";

/// Links of a profile, split by category
///
/// Each group is ordered by `position`; links without one come last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkGroups {
    #[serde(default)]
    pub social: Vec<Item>,
    #[serde(default)]
    pub custom: Vec<Item>,
}

impl LinkGroups {
    /// Group decoded links
    ///
    /// Anything that is not social (including unknown categories) is listed
    /// with the custom links.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let (mut social, mut custom): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| item.category.as_str() == Category::SOCIAL);
        social.sort_by(by_position);
        custom.sort_by(by_position);
        Self { social, custom }
    }

    /// Flatten into one desired list, social links first
    ///
    /// The group a link sits in decides its category.
    pub fn flatten(self) -> Vec<Item> {
        let social = self.social.into_iter().map(|mut item| {
            item.category = Category::social();
            item
        });
        let custom = self.custom.into_iter().map(|mut item| {
            if item.category.as_str() == Category::SOCIAL {
                item.category = Category::custom();
            }
            item
        });
        social.chain(custom).collect()
    }

    pub fn len(&self) -> usize {
        self.social.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn by_position(a: &Item, b: &Item) -> Ordering {
    match (a.position(), b.position()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A profile document with its links
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    /// Every field of the parent document
    pub fields: Fields,
    pub links: LinkGroups,
    /// Whether the local marker matched the document when it was read
    pub freshness: Freshness,
}

impl Profile {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title").and_then(Value::as_str)
    }
}

/// A marker-tracked part of the profile document
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSection {
    /// `basicInfoData`
    BasicInfo(Value),
    /// `aboutData`
    About(Value),
    /// `contactFormData`
    ContactForm(Value),
    /// `themeSettings` and `favoriteColors`
    Theme {
        settings: Value,
        favorite_colors: Value,
    },
    /// `coverImageData`; a `None` url removes the cover image
    CoverImage { url: Option<String> },
}

impl ProfileSection {
    pub fn name(&self) -> &'static str {
        match self {
            ProfileSection::BasicInfo(_) => "basic info",
            ProfileSection::About(_) => "about",
            ProfileSection::ContactForm(_) => "contact form",
            ProfileSection::Theme { .. } => "theme",
            ProfileSection::CoverImage { .. } => "cover image",
        }
    }

    /// Top-level fields written for this section
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        match self {
            ProfileSection::BasicInfo(data) => {
                fields.insert("basicInfoData".to_string(), data);
            }
            ProfileSection::About(data) => {
                fields.insert("aboutData".to_string(), data);
            }
            ProfileSection::ContactForm(data) => {
                fields.insert("contactFormData".to_string(), data);
            }
            ProfileSection::Theme {
                settings,
                favorite_colors,
            } => {
                fields.insert("themeSettings".to_string(), settings);
                fields.insert("favoriteColors".to_string(), favorite_colors);
            }
            ProfileSection::CoverImage { url } => {
                fields.insert("coverImageData".to_string(), json!({ "url": url }));
            }
        }
        fields
    }
}

/// Result of a marker-tracked write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Marker stored on the remote document
    pub marker: VersionMarker,
    /// `false` if the remote write succeeded but the local marker could not
    /// be stored; local and remote now disagree until the next fetch
    pub local_marker_persisted: bool,
}

/// Reads and writes profiles through the document store
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
    local: Arc<dyn LocalStore>,
    profile: ProfileConfig,
    freshness: FreshnessConfig,
    reconciler: Reconciler,
    events: EventSink,
}

impl ProfileService {
    /// Create a profile service over existing stores
    ///
    /// # Returns
    ///
    /// A tuple of (service, event_receiver) where event_receiver yields sync events
    pub fn new(
        store: Arc<dyn DocumentStore>,
        local: Arc<dyn LocalStore>,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.profile.validate()?;
        config.freshness.validate()?;
        config.engine.validate()?;

        let (events, rx) = EventSink::channel(config.engine.event_channel_capacity);
        let reconciler = Reconciler::new(store.clone()).with_events(events.clone());

        let service = Self {
            store,
            local,
            profile: config.profile.clone(),
            freshness: config.freshness.clone(),
            reconciler,
            events,
        };
        Ok((service, rx))
    }

    /// Build both stores through `registry` and create the service
    pub async fn from_config(
        registry: &StoreRegistry,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        let store: Arc<dyn DocumentStore> =
            Arc::from(registry.create_document_store(&config.document_store)?);
        let local: Arc<dyn LocalStore> =
            Arc::from(registry.create_local_store(&config.local_store).await?);
        info!(
            "Profile service using {} document store and {} local store",
            config.document_store.type_name(),
            config.local_store.type_name()
        );
        Self::new(store, local, config)
    }

    /// Marker tracker for one profile
    pub fn tracker(&self, profile_id: &str) -> FreshnessTracker {
        FreshnessTracker::for_parent(self.local.clone(), &self.freshness, profile_id)
    }

    pub fn profile_path(&self, profile_id: &str) -> Result<DocumentPath> {
        validate_id(profile_id)?;
        Ok(CollectionPath::new(self.profile.collection.as_str()).doc(profile_id))
    }

    pub fn links_path(&self, profile_id: &str) -> Result<CollectionPath> {
        Ok(self
            .profile_path(profile_id)?
            .collection(&self.profile.links_collection))
    }

    /// Read a profile with its grouped links
    ///
    /// When the local marker does not match, the remote marker is adopted
    /// locally, since the caller now holds the remote state.
    ///
    /// # Errors
    ///
    /// [`Error::Fetch`] if the document cannot be read or does not exist.
    pub async fn fetch_profile(&self, profile_id: &str) -> Result<Profile> {
        let path = self.profile_path(profile_id)?;
        let document = self
            .store
            .get(&path)
            .await
            .map_err(|e| Error::fetch(format!("Failed to read profile {}: {}", profile_id, e)))?
            .ok_or_else(|| Error::fetch(format!("Profile {} does not exist", profile_id)))?;

        let tracker = self.tracker(profile_id);
        let remote_marker = document.field(&self.profile.version_field);
        let freshness = tracker.check_freshness(remote_marker).await?;

        match (freshness, remote_marker) {
            (Freshness::Fresh, _) => debug!("Profile {} is fresh", profile_id),
            (Freshness::Stale, Some(remote)) => {
                info!("Profile {} changed remotely, adopting remote marker", profile_id);
                if let Err(e) = tracker.adopt(remote).await {
                    warn!("Failed to store remote marker for {}: {}", profile_id, e);
                }
            }
            (Freshness::Stale, None) => {
                debug!("Profile {} has no remote marker", profile_id)
            }
        }
        self.events.emit(SyncEvent::FreshnessChecked {
            profile_id: profile_id.to_string(),
            freshness,
        });

        let links = self.fetch_links(profile_id).await?;

        Ok(Profile {
            id: document.id,
            fields: document.fields,
            links,
            freshness,
        })
    }

    /// Whether the profile document exists
    pub async fn profile_exists(&self, profile_id: &str) -> Result<bool> {
        let path = self.profile_path(profile_id)?;
        Ok(self.store.get(&path).await?.is_some())
    }

    /// Summaries of every profile document
    pub async fn list_profiles(&self) -> Result<Vec<ProfileSummary>> {
        let profiles = CollectionPath::new(self.profile.collection.as_str());
        let documents = self
            .store
            .query(&profiles, &Filter::All)
            .await
            .map_err(|e| Error::fetch(format!("Failed to list {}: {}", profiles, e)))?;
        debug!("Listed {} profile(s)", documents.len());
        Ok(documents.iter().map(ProfileSummary::from_document).collect())
    }

    /// Summary of one profile, `None` if it does not exist
    pub async fn profile_summary(&self, profile_id: &str) -> Result<Option<ProfileSummary>> {
        let path = self.profile_path(profile_id)?;
        let document = self
            .store
            .get(&path)
            .await
            .map_err(|e| Error::fetch(format!("Failed to read profile {}: {}", profile_id, e)))?;
        Ok(document.as_ref().map(ProfileSummary::from_document))
    }

    /// Users attached to a profile, the profile owner first
    ///
    /// Members with an active profile get its contact counters attached.
    pub async fn list_members(&self, profile_id: &str) -> Result<Vec<Member>> {
        validate_id(profile_id)?;
        let users = CollectionPath::new(self.profile.members_collection.as_str());
        let filter = Filter::field_equals(self.profile.member_field.as_str(), profile_id);
        let documents = self
            .store
            .query(&users, &filter)
            .await
            .map_err(|e| Error::fetch(format!("Failed to list members of {}: {}", profile_id, e)))?;

        let mut members: Vec<Member> = documents.into_iter().map(Member::from_document).collect();
        for member in &mut members {
            let Some(active) = member.active_profile_id() else {
                continue;
            };
            let path = users
                .doc(&member.id)
                .collection(ACTIVE_PROFILES_COLLECTION)
                .doc(active);
            let profile = self.store.get(&path).await.map_err(|e| {
                Error::fetch(format!("Failed to read active profile {}: {}", path, e))
            })?;
            if let Some(profile) = profile {
                member.apply_active_profile(&profile);
            }
        }

        // Stable: members keep their query order within each half
        members.sort_by_key(|member| !member.is_master());
        debug!("Profile {} has {} member(s)", profile_id, members.len());
        Ok(members)
    }

    /// Read the links of a profile
    pub async fn fetch_links(&self, profile_id: &str) -> Result<LinkGroups> {
        let links = self.links_path(profile_id)?;
        let documents = self
            .store
            .query(&links, &Filter::All)
            .await
            .map_err(|e| Error::fetch(format!("Failed to read {}: {}", links, e)))?;
        Ok(LinkGroups::from_items(
            documents.into_iter().map(Item::from_document),
        ))
    }

    /// Write one section together with the next version marker
    ///
    /// The local marker is only stored after the remote write succeeded. If
    /// the remote write fails the local marker is untouched, so the next
    /// fetch reads as stale.
    ///
    /// # Errors
    ///
    /// [`Error::Fetch`] if the profile document does not exist; nothing is
    /// written then.
    pub async fn update_section(
        &self,
        profile_id: &str,
        section: ProfileSection,
    ) -> Result<WriteOutcome> {
        let path = self.profile_path(profile_id)?;
        self.require_profile(&path, profile_id).await?;
        let tracker = self.tracker(profile_id);
        let marker = tracker.next_marker().await?;

        let name = section.name();
        let mut fields = section.into_fields();
        fields.insert(self.profile.version_field.clone(), marker.to_value());

        self.store.set(&path, fields, WriteMode::Merge).await?;
        info!("Updated {} of profile {} (marker {})", name, profile_id, marker);

        let local_marker_persisted = match tracker.confirm_write(marker).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Profile {} written with marker {} but the local marker was not stored: {}",
                    profile_id, marker, e
                );
                self.events.emit(SyncEvent::MarkerDiverged {
                    profile_id: profile_id.to_string(),
                    marker,
                    error: e.to_string(),
                });
                false
            }
        };

        Ok(WriteOutcome {
            marker,
            local_marker_persisted,
        })
    }

    /// Set the profile title, mirroring it to the same-id document of the
    /// mirror collection when that document exists
    ///
    /// Fails with [`Error::Fetch`] if the profile document does not exist.
    pub async fn update_title(&self, profile_id: &str, title: &str) -> Result<()> {
        let path = self.profile_path(profile_id)?;
        self.require_profile(&path, profile_id).await?;
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::from(title));

        self.store.set(&path, fields.clone(), WriteMode::Merge).await?;

        if let Some(mirror) = &self.profile.mirror_collection {
            let mirror_path = CollectionPath::new(mirror.as_str()).doc(profile_id);
            if self.store.get(&mirror_path).await?.is_some() {
                self.store.set(&mirror_path, fields, WriteMode::Merge).await?;
                debug!("Mirrored title of {} to {}", profile_id, mirror_path);
            }
        }
        Ok(())
    }

    /// Converge the remote links to `links`
    pub async fn update_links(&self, profile_id: &str, links: LinkGroups) -> Result<ReconcileReport> {
        let path = self.links_path(profile_id)?;
        self.reconciler.reconcile(&path, &links.flatten()).await
    }

    /// Delete the profile document
    ///
    /// Links and the local marker are left in place.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<()> {
        let path = self.profile_path(profile_id)?;
        self.store.delete(&path).await?;
        info!("Deleted profile {}", profile_id);
        Ok(())
    }

    // Merge writes would otherwise recreate a deleted profile
    async fn require_profile(&self, path: &DocumentPath, profile_id: &str) -> Result<()> {
        let exists = self
            .store
            .get(path)
            .await
            .map_err(|e| Error::fetch(format!("Failed to read profile {}: {}", profile_id, e)))?
            .is_some();
        if !exists {
            return Err(Error::fetch(format!("Profile {} does not exist", profile_id)));
        }
        Ok(())
    }

    /// Persist pending local state
    pub async fn flush(&self) -> Result<()> {
        self.local.flush().await
    }
}

fn validate_id(profile_id: &str) -> Result<()> {
    if profile_id.is_empty() || profile_id.contains('/') {
        return Err(Error::invalid_input(format!(
            "Invalid profile id: {:?}",
            profile_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(category: Category, position: Option<i64>) -> Item {
        let item = Item::new(category);
        match position {
            Some(p) => item.with_field("position", p),
            None => item,
        }
    }

    #[test]
    fn groups_sort_by_position_with_missing_last() {
        let groups = LinkGroups::from_items(vec![
            link(Category::custom(), None).with_id("n"),
            link(Category::social(), Some(2)).with_id("s2"),
            link(Category::custom(), Some(1)).with_id("c1"),
            link(Category::social(), Some(0)).with_id("s0"),
            link(Category::new("other"), Some(0)).with_id("o"),
        ]);

        let ids = |items: &[Item]| {
            items
                .iter()
                .map(|i| i.id.clone().unwrap().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&groups.social), vec!["s0", "s2"]);
        assert_eq!(ids(&groups.custom), vec!["o", "c1", "n"]);
    }

    #[test]
    fn flatten_uses_group_as_category() {
        let groups = LinkGroups {
            social: vec![link(Category::custom(), Some(0))],
            custom: vec![link(Category::social(), Some(0)), link(Category::new("menu"), None)],
        };
        let flat = groups.flatten();
        assert_eq!(flat[0].category, Category::social());
        assert_eq!(flat[1].category, Category::custom());
        assert_eq!(flat[2].category, Category::new("menu"));
    }

    #[test]
    fn link_groups_deserialize_without_category() {
        let groups: LinkGroups = serde_json::from_value(json!({
            "social": [{"id": "a", "platform": "x", "position": 0}],
            "custom": [{"title": "menu"}]
        }))
        .unwrap();

        assert_eq!(groups.social[0].id.as_ref().map(|id| id.as_str()), Some("a"));
        assert_eq!(groups.social[0].fields.get("platform"), Some(&json!("x")));
        assert!(groups.custom[0].id.is_none());
    }

    #[test]
    fn section_fields() {
        let fields = ProfileSection::CoverImage { url: None }.into_fields();
        assert_eq!(fields.get("coverImageData"), Some(&json!({"url": null})));

        let fields = ProfileSection::Theme {
            settings: json!({"font": "serif"}),
            favorite_colors: json!(["#fff"]),
        }
        .into_fields();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains_key("favoriteColors"));
    }

    #[test]
    fn rejects_nested_ids() {
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("").is_err());
        assert!(validate_id("abc").is_ok());
    }
}
