use captrail::config::Settings;
use captrail::models::{CapabilityId, CapabilityKind};
use captrail::registry::{Interface, InterfaceImpl};
use captrail::repo::{MemoryRepository, Repository};
use captrail::tree::CapabilityTree;
use captrail::{Error, ModelContext};
use speculate2::speculate;

fn build_service(
    ctx: &ModelContext<'_>,
    tree: &mut CapabilityTree,
    package: uuid::Uuid,
) -> (CapabilityId, Interface) {
    let service = tree
        .create(ctx, package, CapabilityKind::Service, "PaymentService")
        .expect("Failed to create service");
    let implementation = InterfaceImpl::provision(ctx, tree, service, "PaymentInterface")
        .expect("Failed to provision interface");
    (service, Interface::bound(implementation))
}

speculate! {
    before {
        let repo = MemoryRepository::new();
        let package = repo.add_package("Services/Payments");
        let settings = Settings::default();
        let ctx = ModelContext::new(&repo, &settings);
        let mut tree = CapabilityTree::new();
    }

    describe "implementation binding" {
        it "fails every operation until an implementation is bound" {
            let facade = Interface::unbound();
            let classes_before = repo.class_count();

            let err = facade
                .add_operations(&ctx, &mut tree, &["pay"], true)
                .unwrap_err();
            assert!(matches!(err, Error::MissingImplementation { .. }));
            assert!(facade.operations(&tree).is_err());
            assert!(facade.node().is_err());

            // Nothing may have been written
            assert_eq!(repo.class_count(), classes_before);
        }

        it "binds exactly once" {
            let second = tree
                .create(&ctx, package, CapabilityKind::Interface, "Other")
                .unwrap();

            let mut facade = Interface::unbound();
            facade.bind(InterfaceImpl::new(second)).expect("First bind failed");
            let err = facade.bind(InterfaceImpl::new(second)).unwrap_err();
            assert!(matches!(err, Error::InvalidOperation(_)));
            assert!(facade.is_bound());
        }
    }

    describe "add_operations" {
        it "creates operation children in order" {
            let (_, facade) = build_service(&ctx, &mut tree, package);

            let created = facade
                .add_operations(&ctx, &mut tree, &["pay", "refund"], false)
                .expect("Failed to add operations");

            assert_eq!(created.len(), 2);
            assert_eq!(facade.operations(&tree).unwrap(), created);
            assert_eq!(tree.node(created[0]).name, "pay");
            assert_eq!(tree.node(created[1]).name, "refund");
        }

        it "bumps the interface, its schema, and the owning service" {
            let (service, facade) = build_service(&ctx, &mut tree, package);
            let interface = facade.node().unwrap();

            facade
                .add_operations(&ctx, &mut tree, &["pay"], true)
                .expect("Failed to add operations");

            assert_eq!(tree.node(interface).version.to_string(), "1.1");
            assert_eq!(tree.node(service).version.to_string(), "1.1");
            let schema = tree
                .children(interface)
                .iter()
                .copied()
                .find(|&c| tree.node(c).kind == CapabilityKind::CommonSchema)
                .unwrap();
            assert_eq!(tree.node(schema).version.to_string(), "1.1");

            // The element's version tag mirrors the node
            let service_el = tree.node(service).element.unwrap();
            assert_eq!(repo.tag(service_el, "version").as_deref(), Some("1.1"));
        }

        it "leaves versions alone without the bump flag" {
            let (service, facade) = build_service(&ctx, &mut tree, package);

            facade
                .add_operations(&ctx, &mut tree, &["pay"], false)
                .expect("Failed to add operations");

            assert_eq!(tree.node(service).version.to_string(), "1.0");
        }
    }

    describe "associate_operations" {
        it "appends disjoint sets in call order" {
            let (_, facade) = build_service(&ctx, &mut tree, package);
            let a = tree.create(&ctx, package, CapabilityKind::Operation, "a").unwrap();
            let b = tree.create(&ctx, package, CapabilityKind::Operation, "b").unwrap();
            let c = tree.create(&ctx, package, CapabilityKind::Operation, "c").unwrap();

            facade
                .associate_operations(&ctx, &mut tree, &[a, b], false)
                .expect("First associate failed");
            facade
                .associate_operations(&ctx, &mut tree, &[c], false)
                .expect("Second associate failed");

            assert_eq!(facade.operations(&tree).unwrap(), vec![a, b, c]);
        }

        it "creates the structural link in the repository" {
            let (_, facade) = build_service(&ctx, &mut tree, package);
            let op = tree.create(&ctx, package, CapabilityKind::Operation, "a").unwrap();
            let links_before = repo.association_count();

            facade
                .associate_operations(&ctx, &mut tree, &[op], false)
                .unwrap();

            assert_eq!(repo.association_count(), links_before + 1);
        }
    }

    describe "delete and rename" {
        it "removes only the link when resources are kept" {
            let (_, facade) = build_service(&ctx, &mut tree, package);
            let ops = facade
                .add_operations(&ctx, &mut tree, &["pay"], false)
                .unwrap();
            let element = tree.node(ops[0]).element.unwrap();

            facade
                .delete_operation(&ctx, &mut tree, ops[0], false, false)
                .expect("Failed to delete operation");

            assert!(facade.operations(&tree).unwrap().is_empty());
            assert!(repo.class_name(element).is_ok());
        }

        it "removes the element and everything it owns when resources go" {
            let (_, facade) = build_service(&ctx, &mut tree, package);
            let ops = facade
                .add_operations(&ctx, &mut tree, &["pay"], false)
                .unwrap();
            let message = tree
                .create(&ctx, package, CapabilityKind::Message, "payRequest")
                .unwrap();
            tree.attach(&ctx, message, ops[0]).unwrap();
            let op_el = tree.node(ops[0]).element.unwrap();
            let msg_el = tree.node(message).element.unwrap();

            facade
                .delete_operation(&ctx, &mut tree, ops[0], false, true)
                .expect("Failed to delete operation");

            assert!(repo.class_name(op_el).is_err());
            assert!(repo.class_name(msg_el).is_err());
        }

        it "renames in place and verifies the old name" {
            let (service, facade) = build_service(&ctx, &mut tree, package);
            let ops = facade
                .add_operations(&ctx, &mut tree, &["pay"], false)
                .unwrap();

            let err = facade
                .rename_operation(&ctx, &mut tree, ops[0], "charge", "authorize", false)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));

            facade
                .rename_operation(&ctx, &mut tree, ops[0], "pay", "authorize", false)
                .expect("Failed to rename operation");

            assert_eq!(tree.node(ops[0]).name, "authorize");
            let element = tree.node(ops[0]).element.unwrap();
            assert_eq!(repo.class_name(element).unwrap(), "authorize");
            // Rename leaves the service's version to the caller
            assert_eq!(tree.node(service).version.to_string(), "1.0");
        }
    }

    describe "loading from the repository" {
        it "rebuilds the subtree with children registered in order" {
            let (service, facade) = build_service(&ctx, &mut tree, package);
            facade
                .add_operations(&ctx, &mut tree, &["pay", "refund"], true)
                .unwrap();
            let root_el = tree.node(service).element.unwrap();

            let (loaded, root) = CapabilityTree::load(&ctx, root_el)
                .expect("Failed to load tree");

            assert_eq!(loaded.node(root).kind, CapabilityKind::Service);
            assert_eq!(loaded.node(root).version.to_string(), "1.1");
            assert_eq!(loaded.children(root).len(), 1);

            let interface = loaded.children(root)[0];
            assert_eq!(loaded.node(interface).kind, CapabilityKind::Interface);
            let kinds: Vec<_> = loaded
                .children(interface)
                .iter()
                .map(|&c| loaded.node(c).kind)
                .collect();
            assert_eq!(
                kinds,
                vec![
                    CapabilityKind::CommonSchema,
                    CapabilityKind::Operation,
                    CapabilityKind::Operation,
                ]
            );
            let names: Vec<_> = loaded
                .children(interface)
                .iter()
                .map(|&c| loaded.node(c).name.as_str())
                .collect();
            assert_eq!(names, vec!["PaymentInterface", "pay", "refund"]);
        }

        it "rejects elements that are not capabilities" {
            let stranger = repo.create_class(package, "NotACapability", "Note").unwrap();
            let err = CapabilityTree::load(&ctx, stranger).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }
}
