//! Diesel schema for port allocation persistence.
//!
//! `ports` and `port_allocation_logs` are owned by this crate. The
//! `subscriptions`, `customers` and `plans` declarations describe the
//! columns read from tables owned by other subsystems.

diesel::table! {
    /// Provisionable tenant ports.
    ports (id) {
        /// Port identifier.
        id -> Uuid,
        /// Instance URL, unique across the pool.
        #[max_length = 255]
        instance_url -> Varchar,
        /// Database host of the tenant instance.
        #[max_length = 255]
        db_host -> Nullable<Varchar>,
        /// Database name of the tenant instance.
        #[max_length = 255]
        db_name -> Nullable<Varchar>,
        /// Lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Subscription the port is bound to while assigned.
        assigned_subscription_id -> Nullable<Uuid>,
        /// When the current assignment was made.
        assigned_at -> Nullable<Timestamptz>,
        /// Subscription most recently released from the port.
        last_subscription_id -> Nullable<Uuid>,
        /// Hosting region.
        #[max_length = 255]
        server_region -> Nullable<Varchar>,
        /// Administrator notes.
        notes -> Nullable<Text>,
        /// Optimistic concurrency token.
        version -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only allocation audit trail. References carry no foreign keys.
    port_allocation_logs (seq) {
        /// Insertion order.
        seq -> Int8,
        /// Entry identifier.
        id -> Uuid,
        /// Recorded action.
        #[max_length = 50]
        action -> Varchar,
        /// Weak port reference.
        port_id -> Nullable<Uuid>,
        /// Weak customer reference.
        customer_id -> Nullable<Uuid>,
        /// Weak subscription reference.
        subscription_id -> Nullable<Uuid>,
        /// Weak plan reference.
        plan_id -> Nullable<Uuid>,
        /// Acting administrator; null for system actions.
        performed_by -> Nullable<Uuid>,
        /// Free-text justification.
        notes -> Nullable<Text>,
        /// Entry timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Customer subscriptions (read-only).
    subscriptions (id) {
        /// Subscription identifier.
        id -> Uuid,
        /// Owning customer.
        customer_id -> Nullable<Uuid>,
        /// Subscribed plan.
        plan_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    /// Customers (read-only).
    customers (id) {
        /// Customer identifier.
        id -> Uuid,
        /// Display name.
        name -> Varchar,
    }
}

diesel::table! {
    /// Subscription plans (read-only).
    plans (id) {
        /// Plan identifier.
        id -> Uuid,
        /// Display name.
        name -> Varchar,
    }
}

diesel::allow_tables_to_appear_in_same_query!(ports, port_allocation_logs);
