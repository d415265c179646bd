use captrail::config::{keys, Settings};
use captrail::lineage::TicketLineage;
use captrail::models::TicketKey;
use captrail::repo::{MemoryRepository, Repository};
use captrail::{Error, ModelContext};
use speculate2::speculate;

const TICKET_PACKAGE: &str = "Configuration Management/Tickets";

speculate! {
    before {
        let repo = MemoryRepository::new();
        repo.add_package(TICKET_PACKAGE);
        let services = repo.add_package("Services");
        let settings = Settings::default();
        let ctx = ModelContext::new(&repo, &settings);
        let lineage = TicketLineage::new(ctx);

        let service_element = repo
            .create_class(services, "PaymentService", "Service")
            .expect("Failed to create service element");
        let key = TicketKey::new("billing", "CSTI-2345");
    }

    describe "service tickets" {
        it "creates a ticket element named by its qualified id" {
            let ticket = lineage
                .open_service_ticket(key.clone(), service_element)
                .expect("Failed to open service ticket");

            assert!(!ticket.is_disabled());
            let element = ticket.element().unwrap();
            assert_eq!(repo.class_name(element).unwrap(), "billing/CSTI-2345");
            assert!(repo.tag(element, "created").is_some());
        }

        it "loads instead of duplicating an existing qualified id" {
            let first = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let classes_after_first = repo.class_count();

            let second = lineage.open_service_ticket(key.clone(), service_element).unwrap();

            assert_eq!(first.element(), second.element());
            assert_eq!(repo.class_count(), classes_after_first);
        }

        it "fails when the ticket package is missing" {
            let bare = MemoryRepository::new();
            let pkg = bare.add_package("Services");
            let element = bare.create_class(pkg, "S", "Service").unwrap();
            let ctx = ModelContext::new(&bare, &settings);
            let lineage = TicketLineage::new(ctx);

            let err = lineage.open_service_ticket(key.clone(), element).unwrap_err();
            assert!(matches!(err, Error::InvalidOperation(_)));
        }
    }

    describe "configuration management disabled" {
        it "returns inert tickets and never touches the repository" {
            let settings = Settings::default().with(keys::CM_ENABLED, "false");
            let ctx = ModelContext::new(&repo, &settings);
            let lineage = TicketLineage::new(ctx);
            let classes_before = repo.class_count();

            let service_ticket = lineage
                .open_service_ticket(key.clone(), service_element)
                .unwrap();
            let release = lineage
                .open_release_ticket("CSTI-2345", 0, &service_ticket)
                .unwrap();

            assert!(service_ticket.is_disabled());
            assert_eq!(release.release_version(), 0);
            assert!(release.element().is_none());
            assert!(!lineage.has_service_ticket(&release, &service_ticket).unwrap());
            assert_eq!(lineage.released_version(&service_ticket).unwrap(), 0);
            assert_eq!(repo.class_count(), classes_before);
        }
    }

    describe "release version selection" {
        it "creates version 1 when nothing exists and 0 is requested" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();

            let release = lineage
                .open_release_ticket("CSTI-2345", 0, &service_ticket)
                .expect("Failed to open release ticket");

            assert_eq!(release.release_version(), 1);
            assert!(!release.is_existing());
            assert_eq!(release.release_id().as_deref(), Some("release/CSTI-2345.01"));
            let element = release.element().unwrap();
            assert_eq!(repo.class_name(element).unwrap(), "release/CSTI-2345.01");
        }

        it "attaches to the same element when opened twice with version 0" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let first = lineage.open_release_ticket("CSTI-2345", 0, &service_ticket).unwrap();
            let links_after_first = repo.association_count();

            let second = lineage.open_release_ticket("CSTI-2345", 0, &service_ticket).unwrap();

            assert_eq!(first.element(), second.element());
            assert!(second.is_existing());
            assert!(lineage.has_service_ticket(&second, &service_ticket).unwrap());
            // Re-linking the same pair is a no-op, not a duplicate edge
            assert_eq!(repo.association_count(), links_after_first);
        }

        it "creates the requested version when no exact match exists" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();

            let release = lineage
                .open_release_ticket("CSTI-2345", 4, &service_ticket)
                .unwrap();

            assert_eq!(release.release_version(), 4);
            assert!(!release.is_existing());
        }

        it "finds the maximum version independent of creation order" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            lineage.open_release_ticket("CSTI-2345", 1, &service_ticket).unwrap();
            lineage.open_release_ticket("CSTI-2345", 3, &service_ticket).unwrap();
            lineage.open_release_ticket("CSTI-2345", 2, &service_ticket).unwrap();

            let latest = lineage.latest_release("CSTI-2345").unwrap().unwrap();
            assert_eq!(latest.version, 3);

            let attached = lineage.open_release_ticket("CSTI-2345", 0, &service_ticket).unwrap();
            assert_eq!(attached.release_version(), 3);
            assert_eq!(Some(latest.element), attached.element());
        }

        it "skips elements with unparsable version tags" {
            let tickets = repo.find_package(TICKET_PACKAGE).unwrap();
            let stray = repo
                .create_class(tickets, "release/CSTI-2345.99", "ReleaseTicket")
                .unwrap();
            repo.set_tag(stray, "releaseVersion", "beta", true).unwrap();

            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let release = lineage.open_release_ticket("CSTI-2345", 0, &service_ticket).unwrap();

            // The stray element was invisible to the search
            assert_eq!(release.release_version(), 1);
        }

        it "does not leak across ids sharing a prefix" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            lineage.open_release_ticket("CSTI-234", 1, &service_ticket).unwrap();

            assert!(lineage.latest_release("CSTI-23").unwrap().is_none());
        }
    }

    describe "timeline" {
        it "chains each new version to its predecessor" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let v1 = lineage.open_release_ticket("CSTI-2345", 1, &service_ticket).unwrap();
            let v2 = lineage.open_release_ticket("CSTI-2345", 2, &service_ticket).unwrap();

            assert_eq!(lineage.predecessor(&v2).unwrap(), v1.element());
            assert_eq!(lineage.successor(&v1).unwrap(), v2.element());
            assert_eq!(lineage.predecessor(&v1).unwrap(), None);
        }

        it "reconstructs a release from a bare element" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let v2 = lineage.open_release_ticket("CSTI-2345", 2, &service_ticket).unwrap();

            let loaded = lineage.load_release(v2.element().unwrap()).unwrap();
            assert_eq!(loaded.release_version(), 2);
            assert_eq!(loaded.release_id().as_deref(), Some("release/CSTI-2345.02"));
        }

        it "rejects elements without the release stereotype" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let err = lineage.load_release(service_ticket.element().unwrap()).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }

        it "refuses a release whose required version tag is unreadable" {
            let tickets = repo.find_package(TICKET_PACKAGE).unwrap();
            let broken = repo
                .create_class(tickets, "release/CSTI-2345.01", "ReleaseTicket")
                .unwrap();
            repo.set_tag(broken, "releaseVersion", "one", true).unwrap();

            let err = lineage.load_release(broken).unwrap_err();
            assert!(matches!(err, Error::InvalidOperation(_)));
        }
    }

    describe "service associations" {
        it "bundles several services into one release element" {
            let other_element = repo.create_class(services, "RefundService", "Service").unwrap();
            let ticket_a = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let ticket_b = lineage
                .open_service_ticket(TicketKey::new("billing", "CSTI-9000"), other_element)
                .unwrap();

            let for_a = lineage.open_release_ticket("REL-7", 0, &ticket_a).unwrap();
            let classes_after_first = repo.class_count();
            let for_b = lineage.open_release_ticket("REL-7", 0, &ticket_b).unwrap();

            assert_eq!(for_a.element(), for_b.element());
            // The second open adds an association, never a second element
            assert_eq!(repo.class_count(), classes_after_first);
            assert!(lineage.has_service_ticket(&for_a, &ticket_a).unwrap());
            assert!(lineage.has_service_ticket(&for_b, &ticket_b).unwrap());
        }

        it "removes both directions of a pair on unlink" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            let release = lineage.open_release_ticket("CSTI-2345", 0, &service_ticket).unwrap();
            let release_el = release.element().unwrap();
            let ticket_el = service_ticket.element().unwrap();

            lineage.unlink(release_el, ticket_el).unwrap();

            assert!(!lineage.has_service_ticket(&release, &service_ticket).unwrap());
            assert!(repo.associations(release_el).iter().all(|l| l.destination != ticket_el));
            assert!(repo.associations(ticket_el).iter().all(|l| l.destination != release_el));
        }
    }

    describe "released version recording" {
        it "tracks the most recently released version on the service ticket" {
            let service_ticket = lineage.open_service_ticket(key.clone(), service_element).unwrap();
            assert_eq!(lineage.released_version(&service_ticket).unwrap(), 0);

            lineage.open_release_ticket("CSTI-2345", 1, &service_ticket).unwrap();
            assert_eq!(lineage.released_version(&service_ticket).unwrap(), 1);

            lineage.open_release_ticket("CSTI-2345", 2, &service_ticket).unwrap();
            assert_eq!(lineage.released_version(&service_ticket).unwrap(), 2);
        }
    }
}
