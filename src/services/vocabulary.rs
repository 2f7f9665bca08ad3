//! Vocabulary service
//!
//! Personal word and sentence collections. Public collections can be read
//! by any logged-in user; everything else belongs to the owner (and admins).

use crate::db::repositories::VocabularyRepository;
use crate::models::vocabulary::{
    CreateCollectionInput, CreateItemInput, UpdateCollectionInput, UpdateItemInput,
};
use crate::models::{
    contains_hangul, ActivityType, CollectionDetail, CollectionSummary, User, VocabularyCollection,
    VocabularyItem,
};
use crate::services::activity::ActivityService;
use crate::services::error::{ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;

const MAX_SEARCH_RESULTS: i64 = 50;

pub struct VocabularyService {
    repo: Arc<dyn VocabularyRepository>,
    activity: Arc<ActivityService>,
}

impl VocabularyService {
    pub fn new(repo: Arc<dyn VocabularyRepository>, activity: Arc<ActivityService>) -> Self {
        Self { repo, activity }
    }

    pub async fn list_mine(&self, actor: &User) -> ServiceResult<Vec<CollectionSummary>> {
        Ok(self.repo.list_by_user(actor.id).await?)
    }

    pub async fn list_public(&self) -> ServiceResult<Vec<CollectionSummary>> {
        Ok(self.repo.list_public().await?)
    }

    pub async fn create_collection(
        &self,
        actor: &User,
        input: CreateCollectionInput,
    ) -> ServiceResult<VocabularyCollection> {
        let now = Utc::now();
        let collection = VocabularyCollection {
            id: 0,
            title: required(&input.title, "Title")?,
            description: optional(input.description),
            icon: optional(input.icon),
            is_public: input.is_public,
            user_id: actor.id,
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.create_collection(&collection).await?)
    }

    pub async fn get_collection(&self, actor: &User, id: i64) -> ServiceResult<CollectionDetail> {
        let collection = self.find_collection(id).await?;
        let editable = actor.can_edit(collection.user_id);
        if !collection.is_public && !editable {
            return Err(ServiceError::forbidden("This collection is private"));
        }

        let items = self.repo.list_items(id).await?;
        Ok(CollectionDetail {
            collection,
            items,
            editable,
        })
    }

    pub async fn update_collection(
        &self,
        actor: &User,
        id: i64,
        input: UpdateCollectionInput,
    ) -> ServiceResult<VocabularyCollection> {
        let mut collection = self.editable_collection(actor, id).await?;

        if let Some(title) = input.title {
            collection.title = required(&title, "Title")?;
        }
        if let Some(description) = input.description {
            collection.description = optional(Some(description));
        }
        if let Some(icon) = input.icon {
            collection.icon = optional(Some(icon));
        }
        if let Some(public) = input.is_public {
            collection.is_public = public;
        }

        Ok(self.repo.update_collection(&collection).await?)
    }

    pub async fn delete_collection(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.editable_collection(actor, id).await?;
        self.repo.delete_collection(id).await?;
        Ok(())
    }

    /// Add an item; `korean` must contain Hangul
    pub async fn add_item(
        &self,
        actor: &User,
        collection_id: i64,
        input: CreateItemInput,
    ) -> ServiceResult<VocabularyItem> {
        self.editable_collection(actor, collection_id).await?;

        let korean = validate_korean(&input.korean)?;
        let now = Utc::now();
        let item = self
            .repo
            .create_item(&VocabularyItem {
                id: 0,
                collection_id,
                korean,
                meaning: required(&input.meaning, "Meaning")?,
                romanization: optional(input.romanization),
                example_sentence: optional(input.example_sentence),
                example_translation: optional(input.example_translation),
                audio_url: optional(input.audio_url),
                item_type: input.item_type,
                is_checked: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if let Err(e) = self
            .activity
            .record_fixed(actor.id, ActivityType::AddVocabulary, Some(item.id), Some(item.korean.clone()))
            .await
        {
            tracing::warn!(user_id = actor.id, item_id = item.id, error = %e, "Failed to record vocabulary activity");
        }

        Ok(item)
    }

    pub async fn update_item(&self, actor: &User, item_id: i64, input: UpdateItemInput) -> ServiceResult<VocabularyItem> {
        let mut item = self.find_item(item_id).await?;
        self.editable_collection(actor, item.collection_id).await?;

        if let Some(korean) = input.korean {
            item.korean = validate_korean(&korean)?;
        }
        if let Some(meaning) = input.meaning {
            item.meaning = required(&meaning, "Meaning")?;
        }
        if let Some(romanization) = input.romanization {
            item.romanization = optional(Some(romanization));
        }
        if let Some(sentence) = input.example_sentence {
            item.example_sentence = optional(Some(sentence));
        }
        if let Some(translation) = input.example_translation {
            item.example_translation = optional(Some(translation));
        }
        if let Some(audio) = input.audio_url {
            item.audio_url = optional(Some(audio));
        }
        if let Some(item_type) = input.item_type {
            item.item_type = item_type;
        }

        Ok(self.repo.update_item(&item).await?)
    }

    pub async fn delete_item(&self, actor: &User, item_id: i64) -> ServiceResult<()> {
        let item = self.find_item(item_id).await?;
        self.editable_collection(actor, item.collection_id).await?;
        self.repo.delete_item(item_id).await?;
        Ok(())
    }

    /// Flip the learned mark; only the collection owner keeps this state
    pub async fn toggle_checked(&self, actor: &User, item_id: i64) -> ServiceResult<VocabularyItem> {
        let mut item = self.find_item(item_id).await?;
        let collection = self.find_collection(item.collection_id).await?;
        if collection.user_id != actor.id {
            return Err(ServiceError::forbidden("Only the owner can mark items as learned"));
        }

        item.is_checked = !item.is_checked;
        self.repo.set_checked(item_id, item.is_checked).await?;
        Ok(item)
    }

    /// Search the caller's own items
    pub async fn search(&self, actor: &User, query: &str, limit: i64) -> ServiceResult<Vec<VocabularyItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::validation("Search query cannot be empty"));
        }
        Ok(self
            .repo
            .search_items(actor.id, query, limit.clamp(1, MAX_SEARCH_RESULTS))
            .await?)
    }

    async fn find_collection(&self, id: i64) -> ServiceResult<VocabularyCollection> {
        self.repo
            .get_collection(id)
            .await?
            .ok_or(ServiceError::NotFound("Collection"))
    }

    async fn find_item(&self, id: i64) -> ServiceResult<VocabularyItem> {
        self.repo
            .get_item(id)
            .await?
            .ok_or(ServiceError::NotFound("Vocabulary item"))
    }

    async fn editable_collection(&self, actor: &User, id: i64) -> ServiceResult<VocabularyCollection> {
        let collection = self.find_collection(id).await?;
        if !actor.can_edit(collection.user_id) {
            return Err(ServiceError::forbidden("Only the owner can modify this collection"));
        }
        Ok(collection)
    }
}

fn validate_korean(text: &str) -> ServiceResult<String> {
    let text = text.trim();
    if !contains_hangul(text) {
        return Err(ServiceError::validation("Korean text must contain Hangul"));
    }
    Ok(text.to_string())
}

fn required(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxVocabularyRepository;
    use crate::db::test_utils::setup_pool;
    use crate::db::DbPool;
    use crate::models::{UserRole, VocabularyItemType};
    use crate::services::test_support::{activity_service, create_user};

    async fn setup() -> (DbPool, VocabularyService) {
        let pool = setup_pool().await;
        let service = VocabularyService::new(
            SqlxVocabularyRepository::boxed(pool.clone()),
            activity_service(&pool),
        );
        (pool, service)
    }

    fn collection(title: &str, public: bool) -> CreateCollectionInput {
        CreateCollectionInput {
            title: title.into(),
            description: None,
            icon: Some("📚".into()),
            is_public: public,
        }
    }

    fn item(korean: &str, meaning: &str) -> CreateItemInput {
        CreateItemInput {
            korean: korean.into(),
            meaning: meaning.into(),
            romanization: Some("sarang".into()),
            example_sentence: None,
            example_translation: None,
            audio_url: None,
            item_type: VocabularyItemType::Word,
        }
    }

    #[tokio::test]
    async fn test_private_collection_visibility() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let other = create_user(&pool, "Siti", UserRole::Murid).await;
        let admin = create_user(&pool, "Admin", UserRole::Admin).await;

        let private = service.create_collection(&owner, collection("Rahasia", false)).await.unwrap();
        let public = service.create_collection(&owner, collection("Umum", true)).await.unwrap();

        assert!(service.get_collection(&owner, private.id).await.unwrap().editable);
        assert!(service.get_collection(&admin, private.id).await.is_ok());
        assert!(matches!(
            service.get_collection(&other, private.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let detail = service.get_collection(&other, public.id).await.unwrap();
        assert!(!detail.editable);
        assert_eq!(service.list_public().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_item_requires_hangul_and_awards_xp() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let c = service.create_collection(&owner, collection("Kata", false)).await.unwrap();

        let result = service.add_item(&owner, c.id, item("sarang", "cinta")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let added = service.add_item(&owner, c.id, item(" 사랑 ", "cinta")).await.unwrap();
        assert_eq!(added.korean, "사랑");

        service.add_item(&owner, c.id, item("물", "air")).await.unwrap();
        let xp: i64 = sqlx::query_scalar("SELECT xp FROM users WHERE id = ?")
            .bind(owner.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(xp, 4);
    }

    #[tokio::test]
    async fn test_others_cannot_edit_items() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let other = create_user(&pool, "Siti", UserRole::Murid).await;
        let c = service.create_collection(&owner, collection("Kata", true)).await.unwrap();
        let added = service.add_item(&owner, c.id, item("사랑", "cinta")).await.unwrap();

        assert!(matches!(
            service.add_item(&other, c.id, item("물", "air")).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_item(&other, added.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.toggle_checked(&other, added.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_checked() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let c = service.create_collection(&owner, collection("Kata", false)).await.unwrap();
        let added = service.add_item(&owner, c.id, item("사랑", "cinta")).await.unwrap();

        assert!(service.toggle_checked(&owner, added.id).await.unwrap().is_checked);
        assert!(!service.toggle_checked(&owner, added.id).await.unwrap().is_checked);
    }

    #[tokio::test]
    async fn test_search() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let c = service.create_collection(&owner, collection("Kata", false)).await.unwrap();
        service.add_item(&owner, c.id, item("사랑", "cinta")).await.unwrap();
        service.add_item(&owner, c.id, item("물", "air")).await.unwrap();

        let found = service.search(&owner, "cin", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].korean, "사랑");

        assert!(matches!(
            service.search(&owner, "  ", 10).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_collection_and_item() {
        let (pool, service) = setup().await;
        let owner = create_user(&pool, "Budi", UserRole::Murid).await;
        let c = service.create_collection(&owner, collection("Kata", false)).await.unwrap();
        let added = service.add_item(&owner, c.id, item("사랑", "cinta")).await.unwrap();

        let updated = service
            .update_collection(
                &owner,
                c.id,
                UpdateCollectionInput {
                    is_public: Some(true),
                    description: Some("  ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_public);
        assert!(updated.description.is_none());

        let result = service
            .update_item(
                &owner,
                added.id,
                UpdateItemInput {
                    korean: Some("love".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
