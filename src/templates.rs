//! Starter diagrams offered when creating a new document.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub code: &'static str,
}

const FLOWCHART: &str = "graph TD
    A[Start] --> B{Condition}
    B -->|Yes| C[Run step 1]
    B -->|No| D[Run step 2]
    C --> E[End]
    D --> E
    E --> F[Done]";

/// Shown when the store holds no diagrams yet.
pub const DEFAULT_DIAGRAM: &str = FLOWCHART;

static TEMPLATES: [Template; 6] = [
    Template {
        id: "blank",
        name: "Blank",
        description: "Start from an empty document",
        code: "",
    },
    Template {
        id: "flowchart",
        name: "Flowchart",
        description: "Flows and decision trees",
        code: FLOWCHART,
    },
    Template {
        id: "sequence",
        name: "Sequence diagram",
        description: "Interactions between participants over time",
        code: "sequenceDiagram
    participant User
    participant System
    participant Database

    User->>System: Send request
    System->>Database: Query data
    Database-->>System: Return rows
    System-->>User: Respond",
    },
    Template {
        id: "class",
        name: "Class diagram",
        description: "Classes, members and their relationships",
        code: "classDiagram
    class Animal {
        +String name
        +int age
        +makeSound()
    }

    class Dog {
        +String breed
        +bark()
    }

    class Cat {
        +String color
        +meow()
    }

    Animal <|-- Dog
    Animal <|-- Cat",
    },
    Template {
        id: "state",
        name: "State diagram",
        description: "States and the transitions between them",
        code: "stateDiagram-v2
    [*] --> Idle
    Idle --> Running: start
    Running --> Paused: pause
    Paused --> Running: resume
    Running --> Stopped: stop
    Stopped --> [*]",
    },
    Template {
        id: "gantt",
        name: "Gantt chart",
        description: "Project schedule and milestones",
        code: "gantt
    title Project plan
    dateFormat  YYYY-MM-DD
    section Design
    Requirements    :done, des1, 2024-01-01, 2024-01-07
    Architecture    :active, des2, 2024-01-08, 2024-01-15
    section Build
    Frontend        :dev1, 2024-01-16, 2024-01-30
    Backend         :dev2, 2024-01-20, 2024-02-10
    section Test
    Unit tests      :test1, 2024-02-11, 2024-02-20
    Integration     :test2, 2024-02-21, 2024-03-01",
    },
];

pub fn templates() -> &'static [Template] {
    &TEMPLATES
}

pub fn template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}
