//! Push subscriptions, notification inbox and fan-out delivery
//!
//! Every notification is written to the recipient's inbox first, then each
//! subscription gets a payload-less push. A subscription is only removed
//! when the push service answers that it is gone.

use crate::db::repositories::{PushRepository, UserRepository};
use crate::integrations::{DeliveryStatus, PushGateway};
use crate::models::{
    DeliveryReport, Notification, NotificationMessage, PushSubscription, SubscribeInput, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use futures::future::join_all;
use std::sync::Arc;

pub struct PushService {
    repo: Arc<dyn PushRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PushGateway>,
    vapid_public_key: String,
}

impl PushService {
    pub fn new(
        repo: Arc<dyn PushRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn PushGateway>,
        vapid_public_key: String,
    ) -> Self {
        Self {
            repo,
            users,
            gateway,
            vapid_public_key,
        }
    }

    /// Application server key handed to `pushManager.subscribe`
    pub fn vapid_public_key(&self) -> ServiceResult<&str> {
        if self.vapid_public_key.is_empty() {
            return Err(ServiceError::Unavailable("Push notifications"));
        }
        Ok(&self.vapid_public_key)
    }

    pub async fn subscribe(&self, actor: &User, input: SubscribeInput) -> ServiceResult<PushSubscription> {
        let endpoint = input.endpoint.trim();
        if !endpoint.starts_with("https://") {
            return Err(ServiceError::validation("Subscription endpoint must be an https URL"));
        }
        if input.keys.p256dh.is_empty() || input.keys.auth.is_empty() {
            return Err(ServiceError::validation("Subscription keys are required"));
        }

        let subscription = self
            .repo
            .upsert_subscription(actor.id, endpoint, &input.keys.p256dh, &input.keys.auth)
            .await?;
        tracing::debug!(user_id = actor.id, subscription_id = subscription.id, "Push subscription saved");
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, actor: &User, endpoint: &str) -> ServiceResult<()> {
        if !self.repo.delete_subscription(actor.id, endpoint).await? {
            return Err(ServiceError::NotFound("Subscription"));
        }
        Ok(())
    }

    /// Store a notification for one user and push to their devices
    pub async fn send_to_user(&self, user_id: i64, message: &NotificationMessage) -> ServiceResult<DeliveryReport> {
        validate_message(message)?;
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        self.store(user_id, message).await?;
        let subscriptions = self.repo.list_by_user(user_id).await?;
        Ok(self.deliver(subscriptions).await)
    }

    /// Admin broadcast to every subscribed user
    pub async fn broadcast(&self, actor: &User, message: &NotificationMessage) -> ServiceResult<DeliveryReport> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Only admins can broadcast"));
        }
        validate_message(message)?;

        let subscriptions = self.repo.list_all().await?;
        let mut recipients: Vec<i64> = subscriptions.iter().map(|s| s.user_id).collect();
        recipients.sort_unstable();
        recipients.dedup();
        for user_id in recipients {
            self.store(user_id, message).await?;
        }

        let report = self.deliver(subscriptions).await;
        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            removed = report.removed,
            "Broadcast delivered"
        );
        Ok(report)
    }

    pub async fn list_notifications(
        &self,
        actor: &User,
        unread_only: bool,
        limit: i64,
    ) -> ServiceResult<Vec<Notification>> {
        Ok(self
            .repo
            .list_notifications(actor.id, unread_only, limit.clamp(1, 100))
            .await?)
    }

    pub async fn unread_count(&self, actor: &User) -> ServiceResult<i64> {
        Ok(self.repo.unread_count(actor.id).await?)
    }

    pub async fn mark_read(&self, actor: &User, id: i64) -> ServiceResult<()> {
        if !self.repo.mark_read(actor.id, id).await? {
            return Err(ServiceError::NotFound("Notification"));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, actor: &User) -> ServiceResult<u64> {
        Ok(self.repo.mark_all_read(actor.id).await?)
    }

    async fn store(&self, user_id: i64, message: &NotificationMessage) -> ServiceResult<Notification> {
        Ok(self
            .repo
            .create_notification(user_id, &message.title, &message.body, message.url.as_deref())
            .await?)
    }

    /// Push to all subscriptions concurrently and prune the gone ones
    async fn deliver(&self, subscriptions: Vec<PushSubscription>) -> DeliveryReport {
        let results = join_all(subscriptions.iter().map(|s| self.gateway.send(s))).await;

        let mut report = DeliveryReport::default();
        for (subscription, result) in subscriptions.iter().zip(results) {
            match result {
                Ok(DeliveryStatus::Delivered) => report.sent += 1,
                Ok(DeliveryStatus::Gone) => {
                    match self.repo.delete_subscription_by_id(subscription.id).await {
                        Ok(()) => report.removed += 1,
                        Err(e) => tracing::warn!(
                            subscription_id = subscription.id,
                            "Failed to remove expired subscription: {}",
                            e
                        ),
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscription_id = subscription.id,
                        user_id = subscription.user_id,
                        "Push delivery failed: {}",
                        e
                    );
                }
            }
        }
        report
    }
}

fn validate_message(message: &NotificationMessage) -> ServiceResult<()> {
    if message.title.trim().is_empty() {
        return Err(ServiceError::validation("Title cannot be empty"));
    }
    if message.body.trim().is_empty() {
        return Err(ServiceError::validation("Body cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxPushRepository, SqlxUserRepository};
    use crate::db::test_utils::setup_pool;
    use crate::db::DbPool;
    use crate::integrations::fakes::FakePush;
    use crate::models::{SubscriptionKeys, UserRole};
    use crate::services::test_support::create_user;

    fn service(pool: &DbPool, gateway: Arc<FakePush>) -> PushService {
        PushService::new(
            SqlxPushRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            gateway,
            "BPublicKey".to_string(),
        )
    }

    fn subscription(endpoint: &str) -> SubscribeInput {
        SubscribeInput {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256dh".to_string(),
                auth: "auth".to_string(),
            },
        }
    }

    fn message() -> NotificationMessage {
        NotificationMessage {
            title: "Kelas dimulai".to_string(),
            body: "Sesi live akan dimulai 10 menit lagi".to_string(),
            url: Some("/live".to_string()),
        }
    }

    #[tokio::test]
    async fn test_gone_subscription_is_removed() {
        let pool = setup_pool().await;
        let gateway = Arc::new(FakePush::with_gone(&["https://push.test/old"]));
        let service = service(&pool, gateway.clone());
        let user = create_user(&pool, "Budi", UserRole::Murid).await;

        service.subscribe(&user, subscription("https://push.test/old")).await.unwrap();
        service.subscribe(&user, subscription("https://push.test/new")).await.unwrap();

        let report = service.send_to_user(user.id, &message()).await.unwrap();
        assert_eq!(report, DeliveryReport { sent: 1, failed: 0, removed: 1 });
        assert_eq!(gateway.sent.lock().unwrap().as_slice(), ["https://push.test/new"]);

        let report = service.send_to_user(user.id, &message()).await.unwrap();
        assert_eq!(report, DeliveryReport { sent: 1, failed: 0, removed: 0 });
        assert_eq!(service.unread_count(&user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failures_keep_subscription() {
        let pool = setup_pool().await;
        let gateway = Arc::new(FakePush::with_failing(&["https://push.test/flaky"]));
        let service = service(&pool, gateway);
        let user = create_user(&pool, "Budi", UserRole::Murid).await;
        service.subscribe(&user, subscription("https://push.test/flaky")).await.unwrap();

        let report = service.send_to_user(user.id, &message()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 0);

        let report = service.send_to_user(user.id, &message()).await.unwrap();
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_broadcast_admin_only_and_fills_inboxes() {
        let pool = setup_pool().await;
        let service = service(&pool, Arc::new(FakePush::default()));
        let admin = create_user(&pool, "Admin", UserRole::Admin).await;
        let ani = create_user(&pool, "Ani", UserRole::Murid).await;
        let budi = create_user(&pool, "Budi", UserRole::Murid).await;
        service.subscribe(&ani, subscription("https://push.test/ani-1")).await.unwrap();
        service.subscribe(&ani, subscription("https://push.test/ani-2")).await.unwrap();
        service.subscribe(&budi, subscription("https://push.test/budi")).await.unwrap();

        assert!(matches!(
            service.broadcast(&ani, &message()).await,
            Err(ServiceError::Forbidden(_))
        ));

        let report = service.broadcast(&admin, &message()).await.unwrap();
        assert_eq!(report.sent, 3);
        assert_eq!(service.unread_count(&ani).await.unwrap(), 1);
        assert_eq!(service.unread_count(&budi).await.unwrap(), 1);
        assert_eq!(service.unread_count(&admin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inbox_read_state() {
        let pool = setup_pool().await;
        let service = service(&pool, Arc::new(FakePush::default()));
        let user = create_user(&pool, "Budi", UserRole::Murid).await;
        let other = create_user(&pool, "Tono", UserRole::Murid).await;

        service.send_to_user(user.id, &message()).await.unwrap();
        service.send_to_user(user.id, &message()).await.unwrap();
        let inbox = service.list_notifications(&user, true, 10).await.unwrap();
        assert_eq!(inbox.len(), 2);

        assert!(matches!(
            service.mark_read(&other, inbox[0].id).await,
            Err(ServiceError::NotFound(_))
        ));
        service.mark_read(&user, inbox[0].id).await.unwrap();
        assert_eq!(service.unread_count(&user).await.unwrap(), 1);
        assert_eq!(service.mark_all_read(&user).await.unwrap(), 1);
        assert_eq!(service.unread_count(&user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_validation() {
        let pool = setup_pool().await;
        let service = service(&pool, Arc::new(FakePush::default()));
        let user = create_user(&pool, "Budi", UserRole::Murid).await;

        assert!(matches!(
            service.subscribe(&user, subscription("http://push.test/plain")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.unsubscribe(&user, "https://push.test/none").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
