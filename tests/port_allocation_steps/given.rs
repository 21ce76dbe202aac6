//! Given steps for port allocation BDD scenarios.

use super::world::{AllocationWorld, run_async};
use eyre::WrapErr;
use karyalay_ports::allocation::{
    domain::{CustomerId, PlanId, SubscriptionId, SubscriptionSummary},
    services::PortDetailsRequest,
};
use rstest_bdd_macros::given;

fn create_port(world: &mut AllocationWorld, label: &str) -> Result<(), eyre::Report> {
    let url = format!("https://{label}.karyalay.test");
    let created = run_async(
        world
            .registry
            .create(PortDetailsRequest::new(url), world.admin),
    )
    .wrap_err_with(|| format!("create port {label}"))?;
    world.ports.insert(label.to_owned(), created.id());
    Ok(())
}

fn create_subscription(world: &mut AllocationWorld, label: &str) -> Result<(), eyre::Report> {
    let customer_id = CustomerId::new();
    let plan_id = PlanId::new();
    world
        .directory
        .insert_customer(customer_id, format!("Customer {label}"))?;
    world.directory.insert_plan(plan_id, "Business")?;
    let summary = SubscriptionSummary::new(SubscriptionId::new(), Some(customer_id), Some(plan_id));
    world.directory.insert_subscription(summary)?;
    world.subscriptions.insert(label.to_owned(), summary.id());
    Ok(())
}

#[given(r#"an available port "{label}""#)]
fn available_port(world: &mut AllocationWorld, label: String) -> Result<(), eyre::Report> {
    create_port(world, &label)
}

#[given(r#"a disabled port "{label}""#)]
fn disabled_port(world: &mut AllocationWorld, label: String) -> Result<(), eyre::Report> {
    create_port(world, &label)?;
    let port_id = world.port_id(&label)?;
    run_async(world.allocation.disable(port_id, world.admin, None))
        .wrap_err_with(|| format!("disable port {label}"))?;
    Ok(())
}

#[given(r#"a subscription "{label}""#)]
fn subscription(world: &mut AllocationWorld, label: String) -> Result<(), eyre::Report> {
    create_subscription(world, &label)
}

#[given(r#"a port "{port}" assigned to subscription "{subscription}""#)]
fn assigned_port(
    world: &mut AllocationWorld,
    port: String,
    subscription: String,
) -> Result<(), eyre::Report> {
    create_port(world, &port)?;
    create_subscription(world, &subscription)?;
    let port_id = world.port_id(&port)?;
    let subscription_id = world.subscription_id(&subscription)?;
    run_async(
        world
            .allocation
            .assign(port_id, subscription_id, world.admin, None),
    )
    .wrap_err_with(|| format!("assign port {port} to {subscription}"))?;
    Ok(())
}
