use cv_billing_engine::{
    db_types::{ActivationEvent, GatewayOrderId, NewTransaction, Subscription, Transaction, TransactionId},
    traits::{
        ActivationApplied,
        ActivationGrant,
        BillingDatabase,
        BillingDatabaseError,
        OutcomeResolution,
        OutcomeUpdate,
    },
};
use mockall::mock;

mock! {
    pub BillingDb {}

    impl Clone for BillingDb {
        fn clone(&self) -> Self;
    }

    impl BillingDatabase for BillingDb {
        fn url(&self) -> &str;
        async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, BillingDatabaseError>;
        async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, BillingDatabaseError>;
        async fn fetch_transaction_by_order_id(&self, order_id: &GatewayOrderId) -> Result<Option<Transaction>, BillingDatabaseError>;
        async fn record_gateway_outcome(&self, update: OutcomeUpdate) -> Result<OutcomeResolution, BillingDatabaseError>;
        async fn fetch_subscription(&self, buyer_id: &str) -> Result<Option<Subscription>, BillingDatabaseError>;
        async fn fetch_activation_history(&self, buyer_id: &str) -> Result<Vec<ActivationEvent>, BillingDatabaseError>;
        async fn apply_activation(&self, grant: ActivationGrant) -> Result<ActivationApplied, BillingDatabaseError>;
    }
}
