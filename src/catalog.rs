//! Bootstrap topics used to seed an empty knowledge graph.

use crate::models::Topic;

pub fn math_topics() -> Vec<Topic> {
    vec![
        // Foundations
        Topic::new("arithmetic", "Arithmetic", "math")
            .with_description("Basic operations: addition, subtraction, multiplication, division")
            .with_difficulty(0.1)
            .with_hours(2.0)
            .with_concepts(&[
                "addition",
                "subtraction",
                "multiplication",
                "division",
                "order of operations",
            ])
            .with_skills(&["mental math", "estimation"]),
        Topic::new("fractions", "Fractions", "math")
            .with_description("Fraction operations and concepts")
            .with_difficulty(0.2)
            .with_hours(3.0)
            .with_concepts(&["numerator", "denominator", "equivalent fractions", "mixed numbers"])
            .with_skills(&["fraction arithmetic", "simplification"]),
        Topic::new("algebra-basics", "Algebra Basics", "math")
            .with_description("Variables, expressions, and simple equations")
            .with_difficulty(0.25)
            .with_hours(4.0)
            .with_concepts(&["variables", "expressions", "equations", "solving for x"])
            .with_skills(&["equation solving", "expression simplification"]),
        Topic::new("linear-equations", "Linear Equations", "math")
            .with_description("Single-variable and multi-variable linear equations")
            .with_difficulty(0.3)
            .with_hours(3.0)
            .with_concepts(&["slope", "y-intercept", "graphing", "systems of equations"])
            .with_skills(&["graphing lines", "solving systems"]),
        Topic::new("quadratics", "Quadratic Equations", "math")
            .with_description("Quadratic equations and functions")
            .with_difficulty(0.4)
            .with_hours(4.0)
            .with_concepts(&["parabola", "vertex", "roots", "discriminant", "factoring"])
            .with_skills(&["factoring", "quadratic formula", "completing the square"]),
        Topic::new("functions", "Functions", "math")
            .with_description("Function concepts, notation, and operations")
            .with_difficulty(0.35)
            .with_hours(4.0)
            .with_concepts(&["domain", "range", "composition", "inverse", "transformations"])
            .with_skills(&["function evaluation", "graphing", "finding inverses"]),
        Topic::new("trigonometry", "Trigonometry", "math")
            .with_description("Trigonometric functions and identities")
            .with_difficulty(0.45)
            .with_hours(6.0)
            .with_concepts(&["sine", "cosine", "tangent", "unit circle", "identities"])
            .with_skills(&[
                "evaluating trig functions",
                "proving identities",
                "solving trig equations",
            ]),
        // Calculus
        Topic::new("limits", "Limits", "math")
            .with_description("Concept of limits and continuity")
            .with_difficulty(0.5)
            .with_hours(4.0)
            .with_concepts(&[
                "limit definition",
                "one-sided limits",
                "continuity",
                "L'Hopital's rule",
            ])
            .with_skills(&["evaluating limits", "epsilon-delta proofs"]),
        Topic::new("derivatives", "Derivatives", "math")
            .with_description("Differentiation rules and applications")
            .with_difficulty(0.55)
            .with_hours(6.0)
            .with_concepts(&["derivative definition", "power rule", "chain rule", "product rule"])
            .with_skills(&["differentiation", "finding tangent lines", "optimization"]),
        Topic::new("integrals", "Integrals", "math")
            .with_description("Integration techniques and applications")
            .with_difficulty(0.6)
            .with_hours(8.0)
            .with_concepts(&["antiderivative", "definite integral", "FTC", "area under curve"])
            .with_skills(&["basic integration", "substitution", "area calculation"]),
        Topic::new("integration-techniques", "Integration Techniques", "math")
            .with_description("Advanced integration methods")
            .with_difficulty(0.65)
            .with_hours(6.0)
            .with_concepts(&["integration by parts", "partial fractions", "trig substitution"])
            .with_skills(&["choosing techniques", "complex integrals"]),
        Topic::new("sequences-series", "Sequences and Series", "math")
            .with_description("Infinite sequences and series")
            .with_difficulty(0.6)
            .with_hours(6.0)
            .with_concepts(&["convergence", "divergence", "Taylor series", "power series"])
            .with_skills(&["convergence tests", "finding sums", "Taylor expansion"]),
        Topic::new("multivariable-calculus", "Multivariable Calculus", "math")
            .with_description("Calculus in multiple dimensions")
            .with_difficulty(0.7)
            .with_hours(10.0)
            .with_concepts(&[
                "partial derivatives",
                "gradients",
                "multiple integrals",
                "vector fields",
            ])
            .with_skills(&[
                "partial differentiation",
                "multiple integration",
                "vector calculus",
            ]),
        // Linear algebra
        Topic::new("vectors", "Vectors", "math")
            .with_description("Vector operations and geometry")
            .with_difficulty(0.4)
            .with_hours(4.0)
            .with_concepts(&[
                "vector addition",
                "scalar multiplication",
                "dot product",
                "cross product",
            ])
            .with_skills(&["vector operations", "geometric interpretation"]),
        Topic::new("matrices", "Matrices", "math")
            .with_description("Matrix operations and properties")
            .with_difficulty(0.45)
            .with_hours(5.0)
            .with_concepts(&["matrix multiplication", "transpose", "inverse", "determinant"])
            .with_skills(&["matrix arithmetic", "finding inverses", "solving systems"]),
        Topic::new("linear-transformations", "Linear Transformations", "math")
            .with_description("Linear maps and their properties")
            .with_difficulty(0.55)
            .with_hours(4.0)
            .with_concepts(&["kernel", "image", "rank", "nullity"])
            .with_skills(&[
                "finding matrix representations",
                "analyzing transformations",
            ]),
        Topic::new("eigenvalues", "Eigenvalues and Eigenvectors", "math")
            .with_description("Eigentheory and diagonalization")
            .with_difficulty(0.6)
            .with_hours(5.0)
            .with_concepts(&[
                "eigenvalue",
                "eigenvector",
                "characteristic polynomial",
                "diagonalization",
            ])
            .with_skills(&["finding eigenvalues", "diagonalizing matrices"]),
    ]
}

pub const MATH_PREREQUISITES: &[(&str, &[&str])] = &[
    ("fractions", &["arithmetic"]),
    ("algebra-basics", &["arithmetic"]),
    ("linear-equations", &["algebra-basics"]),
    ("quadratics", &["linear-equations"]),
    ("functions", &["algebra-basics"]),
    ("trigonometry", &["functions", "algebra-basics"]),
    ("limits", &["functions", "algebra-basics"]),
    ("derivatives", &["limits"]),
    ("integrals", &["derivatives"]),
    ("integration-techniques", &["integrals"]),
    ("sequences-series", &["limits", "integrals"]),
    ("multivariable-calculus", &["integrals", "vectors"]),
    ("vectors", &["algebra-basics"]),
    ("matrices", &["vectors", "linear-equations"]),
    ("linear-transformations", &["matrices"]),
    ("eigenvalues", &["linear-transformations", "quadratics"]),
];

pub fn cs_topics() -> Vec<Topic> {
    vec![
        Topic::new("programming-basics", "Programming Basics", "cs")
            .with_description("Variables, control flow, functions")
            .with_difficulty(0.2)
            .with_hours(6.0)
            .with_concepts(&["variables", "loops", "conditionals", "functions"])
            .with_skills(&["writing simple programs", "debugging"]),
        Topic::new("data-structures", "Data Structures", "cs")
            .with_description("Arrays, linked lists, stacks, queues")
            .with_difficulty(0.4)
            .with_hours(8.0)
            .with_concepts(&["arrays", "linked lists", "stacks", "queues", "trees"])
            .with_skills(&[
                "implementing data structures",
                "choosing appropriate structures",
            ]),
        Topic::new("algorithms", "Algorithms", "cs")
            .with_description("Sorting, searching, complexity analysis")
            .with_difficulty(0.5)
            .with_hours(10.0)
            .with_concepts(&["big-O", "sorting", "searching", "recursion"])
            .with_skills(&["algorithm analysis", "implementing algorithms"]),
        Topic::new("graphs", "Graph Algorithms", "cs")
            .with_description("Graph representations and algorithms")
            .with_difficulty(0.6)
            .with_hours(8.0)
            .with_concepts(&["BFS", "DFS", "shortest paths", "minimum spanning trees"])
            .with_skills(&["graph traversal", "implementing graph algorithms"]),
        Topic::new("dynamic-programming", "Dynamic Programming", "cs")
            .with_description("Optimal substructure and memoization")
            .with_difficulty(0.65)
            .with_hours(8.0)
            .with_concepts(&["memoization", "tabulation", "optimal substructure"])
            .with_skills(&["identifying DP problems", "formulating recurrences"]),
    ]
}

pub const CS_PREREQUISITES: &[(&str, &[&str])] = &[
    ("data-structures", &["programming-basics"]),
    ("algorithms", &["data-structures"]),
    ("graphs", &["algorithms"]),
    ("dynamic-programming", &["algorithms"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn topic_ids_are_unique() {
        let mut seen = HashSet::new();
        for topic in math_topics().into_iter().chain(cs_topics()) {
            assert!(seen.insert(topic.id.clone()), "duplicate id {}", topic.id);
        }
        assert_eq!(seen.len(), 22);
    }

    #[test]
    fn prerequisites_reference_catalog_topics() {
        let ids: HashSet<String> = math_topics()
            .into_iter()
            .chain(cs_topics())
            .map(|t| t.id)
            .collect();

        for (topic, prereqs) in MATH_PREREQUISITES.iter().chain(CS_PREREQUISITES) {
            assert!(ids.contains(*topic), "unknown topic {}", topic);
            for prereq in prereqs.iter() {
                assert!(ids.contains(*prereq), "unknown prerequisite {}", prereq);
            }
        }
    }
}
