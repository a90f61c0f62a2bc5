//! The built-in smoke suite: a create → provision → delete pass over an
//! in-process fake deployment.
//!
//! This is what `gauntlet run` executes out of the box. It doubles as a
//! live demonstration of the registration API: groups and dependency
//! edges mirror a real control-plane suite (service initialization, then
//! instance creation, then API surfaces against the running instance,
//! then deletion).

pub mod fake;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::asserts::{check_contains, check_equal, check_true};
use crate::poll::{PollOptions, poll_until, poll_until_true};
use crate::registry::{CaseBuilder, ClassBuilder, TestRegistry};
use crate::runner::result::CaseError;
use crate::suite::fake::{FakeControlPlane, InstanceStatus};
use crate::users::Requirements;

fn poll_options() -> PollOptions {
    // The fake advances per observation, so polls converge in a few
    // milliseconds; the bound only matters if the fake regresses.
    PollOptions {
        sleep_interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(2)),
    }
}

/// Register the smoke suite against a fresh fake control plane.
pub fn register(registry: &mut TestRegistry) {
    let plane = Rc::new(RefCell::new(FakeControlPlane::new()));

    let p = Rc::clone(&plane);
    registry.register_case(
        CaseBuilder::new("wait_for_control_plane")
            .group("services.initialize")
            .run(move |_| {
                poll_until_true(|| p.borrow_mut().is_ready(), &poll_options())?;
                Ok(())
            }),
    );

    let create = {
        let p_create = Rc::clone(&plane);
        let p_build = Rc::clone(&plane);
        let p_wait = Rc::clone(&plane);
        ClassBuilder::new("CreateInstance")
            .group("dbaas.guest.initialize")
            .depends_on_group("services.initialize")
            .before(|ctx| {
                let owner = ctx
                    .users
                    .find_user(&Requirements::new(false), &[])?
                    .auth_user
                    .clone();
                ctx.set("instance.owner", owner);
                Ok(())
            })
            .case(CaseBuilder::new("create").run(move |ctx| {
                let owner = ctx.require_str("instance.owner")?.to_owned();
                let name = format!("{owner}_instance");
                let id = p_create.borrow_mut().create_instance(&name, "m1.small");
                ctx.set("instance.id", id);
                ctx.set("instance.name", name);
                Ok(())
            }))
            .case(
                CaseBuilder::new("guest_starts_building")
                    .depends_on_case("create")
                    .run(move |ctx| {
                        let id = ctx.require_u64("instance.id")?;
                        let status = p_build.borrow_mut().status(id);
                        check_true(
                            status == Some(InstanceStatus::Build),
                            format!("expected a fresh instance in BUILD, saw {status:?}"),
                        )
                    }),
            )
            .case(
                CaseBuilder::new("wait_for_active")
                    .depends_on_case("guest_starts_building")
                    .run(move |ctx| {
                        let id = ctx.require_u64("instance.id")?;
                        poll_until(
                            || p_wait.borrow_mut().status(id),
                            |s| *s == Some(InstanceStatus::Active),
                            &poll_options(),
                        )?;
                        Ok(())
                    }),
            )
            .build()
    };
    registry.register_class(create);

    let databases = {
        let p_create = Rc::clone(&plane);
        let p_list = Rc::clone(&plane);
        ClassBuilder::new("Databases")
            .group("dbaas.api.databases")
            .depends_on_class("CreateInstance")
            .case(CaseBuilder::new("create_databases").run(move |ctx| {
                let id = ctx.require_u64("instance.id")?;
                let mut plane = p_create.borrow_mut();
                plane
                    .add_database(id, "firstdb")
                    .map_err(CaseError::runtime)?;
                plane
                    .add_database(id, "seconddb")
                    .map_err(CaseError::runtime)?;
                Ok(())
            }))
            .case(
                CaseBuilder::new("databases_are_listed")
                    .depends_on_case("create_databases")
                    .run(move |ctx| {
                        let id = ctx.require_u64("instance.id")?;
                        let plane = p_list.borrow();
                        let names = plane
                            .databases(id)
                            .ok_or_else(|| CaseError::runtime("instance vanished"))?;
                        check_equal(names.len(), 2, "database count")?;
                        check_contains(&names.join(","), "firstdb", "database listing")
                    }),
            )
            .build()
    };
    registry.register_class(databases);

    let root = {
        let p_enable = Rc::clone(&plane);
        let p_verify = Rc::clone(&plane);
        ClassBuilder::new("RootAccess")
            .group("dbaas.api.root")
            .depends_on_class("CreateInstance")
            .case(CaseBuilder::new("enable_root").run(move |ctx| {
                let id = ctx.require_u64("instance.id")?;
                let password = p_enable
                    .borrow_mut()
                    .enable_root(id)
                    .map_err(CaseError::runtime)?;
                ctx.set("instance.root_password", password);
                Ok(())
            }))
            .case(
                CaseBuilder::new("root_is_reported_enabled")
                    .depends_on_case("enable_root")
                    .run(move |ctx| {
                        let id = ctx.require_u64("instance.id")?;
                        check_true(
                            p_verify.borrow().root_enabled(id) == Some(true),
                            "root history should report enabled",
                        )
                    }),
            )
            .build()
    };
    registry.register_class(root);

    let delete = {
        let p_delete = Rc::clone(&plane);
        let p_gone = Rc::clone(&plane);
        let p_purge = Rc::clone(&plane);
        ClassBuilder::new("DeleteInstance")
            .group("dbaas.api.instances.delete")
            .depends_on_group("dbaas.api.databases")
            .depends_on_group("dbaas.api.root")
            .case(CaseBuilder::new("delete").run(move |ctx| {
                let id = ctx.require_u64("instance.id")?;
                p_delete
                    .borrow_mut()
                    .delete_instance(id)
                    .map_err(CaseError::runtime)
            }))
            .case(
                CaseBuilder::new("wait_until_gone")
                    .depends_on_case("delete")
                    .run(move |ctx| {
                        let id = ctx.require_u64("instance.id")?;
                        poll_until(
                            || p_gone.borrow_mut().status(id),
                            Option::is_none,
                            &poll_options(),
                        )?;
                        Ok(())
                    }),
            )
            .after_always(move |_| {
                // Leftovers from failed runs must not outlive the suite.
                p_purge.borrow_mut().purge();
                Ok(())
            })
            .build()
    };
    registry.register_class(delete);
}

/// A registry holding only the smoke suite.
pub fn smoke_registry() -> TestRegistry {
    let mut registry = TestRegistry::new();
    register(&mut registry);
    registry
}
